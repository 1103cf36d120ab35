use crate::allocation::UNALLOCATED;
use crate::error::{BillingError, Result};
use crate::report::{AppliedOverride, InvoiceLine, OverrideChange};
use crate::schema::{CostObjectHours, InvoiceLineOverride, OverrideKind};

/// A cost-split override must reproduce the computed billable hours within
/// this tolerance. Larger gaps are a data error surfaced to the caller.
pub const SPLIT_TOLERANCE: f64 = 0.01;

/// Applies the active override for a (reservation, year, month) key to a
/// computed line, returning the final line to invoice.
///
/// Pure function of `(line, override)`: applying the same override to the same
/// computed line always yields the identical result. The original computed
/// values are retained on the line for audit display.
pub fn apply_override(
    mut line: InvoiceLine,
    active: Option<&InvoiceLineOverride>,
) -> Result<InvoiceLine> {
    let record = match active {
        Some(record) => record,
        None => return Ok(line),
    };

    let change = match &record.kind {
        OverrideKind::Exclude => {
            let original_hours = line.billable_hours;
            line.excluded = true;
            line.billable_hours = 0.0;
            line.cost_breakdown = Vec::new();
            OverrideChange::Exclude { original_hours }
        }

        OverrideKind::Hours { hours } => {
            let original_hours = line.billable_hours;
            line.cost_breakdown = rescale_breakdown(&line.cost_breakdown, *hours);
            line.billable_hours = *hours;
            OverrideChange::Hours {
                original_hours,
                override_hours: *hours,
            }
        }

        OverrideKind::CostSplit { breakdown } => {
            let total: f64 = breakdown.iter().map(|entry| entry.hours).sum();
            if (total - line.billable_hours).abs() > SPLIT_TOLERANCE {
                return Err(BillingError::OverrideMismatch {
                    reservation_id: record.reservation_id.clone(),
                    expected: line.billable_hours,
                    actual: total,
                });
            }
            let original_breakdown =
                std::mem::replace(&mut line.cost_breakdown, breakdown.clone());
            OverrideChange::CostSplit {
                original_breakdown,
                override_breakdown: breakdown.clone(),
            }
        }
    };

    line.applied_override = Some(AppliedOverride {
        author: record.author.clone(),
        at: record.created_at,
        notes: record.notes.clone(),
        change,
    });
    Ok(line)
}

/// Rescale a computed breakdown to a new total, preserving the original
/// computed shares. Never re-resolves from a snapshot. A zero computed total
/// leaves no shares to preserve, so everything lands on the sentinel.
fn rescale_breakdown(original: &[CostObjectHours], new_total: f64) -> Vec<CostObjectHours> {
    let original_total: f64 = original.iter().map(|entry| entry.hours).sum();

    if original_total.abs() < f64::EPSILON {
        if new_total == 0.0 {
            return Vec::new();
        }
        return vec![CostObjectHours {
            cost_object_id: UNALLOCATED.to_string(),
            hours: new_total,
        }];
    }

    original
        .iter()
        .map(|entry| CostObjectHours {
            cost_object_id: entry.cost_object_id.clone(),
            hours: new_total * entry.hours / original_total,
        })
        .collect()
}
