use crate::allocation::{split_hours, UNALLOCATED};
use crate::daily::day_hours;
use crate::error::{BillingError, Result};
use crate::interval::Interval;
use crate::overrides::apply_override;
use crate::period::InvoicePeriod;
use crate::report::{
    DayAudit, InvoiceLine, ProjectInvoice, Report, ReportError, ReportWarning,
};
use crate::repository::{
    CostAllocationRepository, MaintenanceWindowRepository, OverrideRepository, ProjectRepository,
    ReservationRepository,
};
use crate::schema::{CostObjectHours, Project, Reservation};
use crate::utils::{day_span, days_covered, round2};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation for large batch runs. The assembler checks it once
/// per project, not once per day, so the overhead stays negligible.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub generated_by: String,
    /// Injected "now" stamped onto the report, so a regenerated month is
    /// reproducible in tests and audits.
    pub now: DateTime<Utc>,
    pub cancel: Option<CancelToken>,
}

impl GenerateOptions {
    pub fn new(generated_by: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            generated_by: generated_by.into(),
            now,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

struct LineOutcome {
    line: InvoiceLine,
    gap_days: usize,
    override_error: Option<BillingError>,
}

struct ProjectOutcome {
    invoice: ProjectInvoice,
    errors: Vec<ReportError>,
    warnings: Vec<ReportWarning>,
    excluded: usize,
}

/// Orchestrates one month's invoice computation over the read-only
/// collaborators. Stateless and side-effect-free per invocation; reports for
/// different periods or projects may be generated concurrently.
pub struct InvoiceAssembler<'a> {
    reservations: &'a dyn ReservationRepository,
    maintenance: &'a dyn MaintenanceWindowRepository,
    allocations: &'a dyn CostAllocationRepository,
    overrides: &'a dyn OverrideRepository,
    projects: &'a dyn ProjectRepository,
}

impl<'a> InvoiceAssembler<'a> {
    pub fn new(
        reservations: &'a dyn ReservationRepository,
        maintenance: &'a dyn MaintenanceWindowRepository,
        allocations: &'a dyn CostAllocationRepository,
        overrides: &'a dyn OverrideRepository,
        projects: &'a dyn ProjectRepository,
    ) -> Self {
        Self {
            reservations,
            maintenance,
            allocations,
            overrides,
            projects,
        }
    }

    /// All five collaborators backed by one in-memory dataset.
    pub fn for_dataset(dataset: &'a crate::repository::BillingDataset) -> Self {
        Self::new(dataset, dataset, dataset, dataset, dataset)
    }

    /// Computes the invoice report for one billing month.
    ///
    /// A malformed reservation never aborts the batch; it is recorded in the
    /// report's `errors` and the rest computes normally. Hard failures are an
    /// invalid period, an unknown project id, and observed cancellation.
    pub fn generate_report(
        &self,
        period: &InvoicePeriod,
        options: &GenerateOptions,
    ) -> Result<Report> {
        let month_span = period.span()?;
        info!(
            "Generating invoice report for {}-{:02}",
            period.year, period.month
        );

        let mut billable = Vec::new();
        for reservation in self.reservations.find_overlapping(&month_span) {
            if reservation.is_billable() {
                billable.push(reservation);
            } else {
                debug!(
                    "Skipping reservation {} with non-billable status {:?}",
                    reservation.id, reservation.status
                );
            }
        }
        let total_reservations = billable.len();

        let mut by_project: BTreeMap<String, Vec<Reservation>> = BTreeMap::new();
        for reservation in billable {
            by_project
                .entry(reservation.project_id.clone())
                .or_default()
                .push(reservation);
        }

        // Resolve directory entries up front: a reservation pointing at a
        // project the directory does not know is engine-level misconfiguration
        // and fails the whole call.
        let mut groups: Vec<(Project, Vec<Reservation>)> = Vec::with_capacity(by_project.len());
        for (project_id, mut reservations) in by_project {
            let project = self
                .projects
                .project(&project_id)
                .ok_or_else(|| BillingError::UnknownProject {
                    project_id: project_id.clone(),
                })?
                .clone();
            reservations.sort_by(|a, b| a.start.cmp(&b.start).then(a.id.cmp(&b.id)));
            groups.push((project, reservations));
        }

        let outcomes: Result<Vec<ProjectOutcome>> = groups
            .par_iter()
            .map(|(project, reservations)| {
                if let Some(token) = &options.cancel {
                    if token.is_cancelled() {
                        return Err(BillingError::Cancelled);
                    }
                }
                Ok(self.assemble_project(project, reservations, &month_span, period))
            })
            .collect();
        let outcomes = outcomes?;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut projects = Vec::new();
        let mut excluded_count = 0;
        for outcome in outcomes {
            errors.extend(outcome.errors);
            warnings.extend(outcome.warnings);
            excluded_count += outcome.excluded;
            projects.push(outcome.invoice);
        }

        info!(
            "Report for {}-{:02} covers {} reservations across {} projects ({} excluded, {} errors, {} warnings)",
            period.year,
            period.month,
            total_reservations,
            projects.len(),
            excluded_count,
            errors.len(),
            warnings.len()
        );

        Ok(Report {
            year: period.year,
            month: period.month,
            generated_at: options.now,
            generated_by: options.generated_by.clone(),
            finalize_state: period.state(),
            total_reservations,
            excluded_count,
            errors,
            warnings,
            projects,
        })
    }

    fn assemble_project(
        &self,
        project: &Project,
        reservations: &[Reservation],
        month_span: &Interval,
        period: &InvoicePeriod,
    ) -> ProjectOutcome {
        let mut lines = Vec::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for reservation in reservations {
            match self.compute_line(reservation, month_span, period) {
                Ok(outcome) => {
                    if outcome.gap_days > 0 {
                        let message = format!(
                            "{} day(s) in {}-{:02} have no active cost allocation; hours reported as {}",
                            outcome.gap_days, period.year, period.month, UNALLOCATED
                        );
                        warn!("Reservation {}: {}", reservation.id, message);
                        warnings.push(ReportWarning {
                            reservation_id: reservation.id.clone(),
                            message,
                        });
                    }
                    if let Some(err) = outcome.override_error {
                        warn!("Reservation {}: {}", reservation.id, err);
                        errors.push(ReportError {
                            reservation_id: reservation.id.clone(),
                            message: err.to_string(),
                        });
                    }
                    lines.push(outcome.line);
                }
                Err(err) => {
                    debug!("Skipping reservation {}: {}", reservation.id, err);
                    errors.push(ReportError {
                        reservation_id: reservation.id.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        // Totals sum non-excluded lines only, in full precision; rounding
        // happens once at the end to avoid cumulative drift.
        let mut total_hours = 0.0;
        let mut cost_totals: BTreeMap<String, f64> = BTreeMap::new();
        let mut excluded = 0;
        for line in &lines {
            if line.excluded {
                excluded += 1;
                continue;
            }
            total_hours += line.billable_hours;
            for entry in &line.cost_breakdown {
                *cost_totals.entry(entry.cost_object_id.clone()).or_default() += entry.hours;
            }
        }

        for line in &mut lines {
            round_line(line);
        }
        let cost_totals = cost_totals
            .into_iter()
            .map(|(id, hours)| (id, round2(hours)))
            .collect();

        ProjectOutcome {
            invoice: ProjectInvoice {
                project_id: project.id.clone(),
                project_title: project.title.clone(),
                project_owner: project.owner.clone(),
                total_hours: round2(total_hours),
                cost_totals,
                lines,
            },
            errors,
            warnings,
            excluded,
        }
    }

    fn compute_line(
        &self,
        reservation: &Reservation,
        month_span: &Interval,
        period: &InvoicePeriod,
    ) -> Result<LineOutcome> {
        if reservation.end <= reservation.start {
            return Err(BillingError::InvalidSpan {
                reservation_id: reservation.id.clone(),
                start: reservation.start,
                end: reservation.end,
            });
        }
        if reservation.node.trim().is_empty() {
            return Err(BillingError::MissingNode {
                reservation_id: reservation.id.clone(),
            });
        }

        let clipped = reservation
            .span()
            .intersect(month_span)
            .unwrap_or(Interval::new(month_span.start, month_span.start));

        // One pre-filter over the reservation's clipped span; the day loop
        // then only ever sees windows that can matter.
        let windows = self.maintenance.find_overlapping(&clipped);

        let mut raw_total = 0.0;
        let mut maintenance_total = 0.0;
        let mut billable_total = 0.0;
        let mut breakdown: BTreeMap<String, f64> = BTreeMap::new();
        let mut days = Vec::new();
        let mut gap_days = 0;

        for date in days_covered(&clipped) {
            let day = day_hours(&clipped, date, &windows);
            let snapshot = self
                .allocations
                .active_snapshot_for(&reservation.project_id, day_span(date).start);

            match snapshot {
                Some(snapshot) => {
                    for (cost_object_id, hours) in split_hours(day.billable_hours, snapshot) {
                        *breakdown.entry(cost_object_id).or_default() += hours;
                    }
                }
                None if day.billable_hours > 0.0 => {
                    *breakdown.entry(UNALLOCATED.to_string()).or_default() +=
                        day.billable_hours;
                    gap_days += 1;
                }
                None => {}
            }

            raw_total += day.raw_hours;
            maintenance_total += day.maintenance_hours;
            billable_total += day.billable_hours;
            days.push(DayAudit {
                date,
                raw_hours: day.raw_hours,
                maintenance_hours: day.maintenance_hours,
                billable_hours: day.billable_hours,
                snapshot_id: snapshot.map(|s| s.id.clone()),
            });
        }

        let line = InvoiceLine {
            reservation_id: reservation.id.clone(),
            node: reservation.node.clone(),
            start: reservation.start,
            end: reservation.end,
            raw_hours: raw_total,
            maintenance_deduction: maintenance_total,
            billable_hours: billable_total,
            excluded: false,
            cost_breakdown: breakdown
                .into_iter()
                .map(|(cost_object_id, hours)| CostObjectHours {
                    cost_object_id,
                    hours,
                })
                .collect(),
            applied_override: None,
            days,
        };

        let active = self
            .overrides
            .active_for(&reservation.id, period.year, period.month);
        match apply_override(line.clone(), active) {
            Ok(line) => Ok(LineOutcome {
                line,
                gap_days,
                override_error: None,
            }),
            // An inconsistent override is surfaced but never silently applied;
            // the computed line stands.
            Err(err) => Ok(LineOutcome {
                line,
                gap_days,
                override_error: Some(err),
            }),
        }
    }
}

fn round_line(line: &mut InvoiceLine) {
    line.raw_hours = round2(line.raw_hours);
    line.maintenance_deduction = round2(line.maintenance_deduction);
    line.billable_hours = round2(line.billable_hours);
    for entry in &mut line.cost_breakdown {
        entry.hours = round2(entry.hours);
    }
}
