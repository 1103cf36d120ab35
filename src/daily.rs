use crate::interval::Interval;
use crate::maintenance;
use crate::schema::MaintenanceWindow;
use crate::utils::day_span;
use chrono::NaiveDate;

/// Net billable hours for one calendar day of one reservation, with the raw
/// and deducted components kept for the per-day audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct DayHours {
    pub date: NaiveDate,
    pub raw_hours: f64,
    pub maintenance_hours: f64,
    pub billable_hours: f64,
    /// Titles of maintenance windows that overlapped this day.
    pub windows: Vec<String>,
}

impl DayHours {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            raw_hours: 0.0,
            maintenance_hours: 0.0,
            billable_hours: 0.0,
            windows: Vec::new(),
        }
    }
}

/// Billable hours of `reservation_span` within one calendar day, after
/// maintenance deduction. The caller passes the reservation span already
/// clipped to month boundaries; clipping to the day happens here.
pub fn day_hours(
    reservation_span: &Interval,
    date: NaiveDate,
    windows: &[MaintenanceWindow],
) -> DayHours {
    let day = day_span(date);
    let effective = match reservation_span.intersect(&day) {
        Some(effective) => effective,
        None => return DayHours::empty(date),
    };

    let raw_hours = effective.hours();
    let deduction = maintenance::overlap(&effective, windows);
    // Maintenance overlap is union-merged inside the effective span, so it can
    // never exceed raw_hours; the floor only absorbs floating-point dust.
    let billable_hours = (raw_hours - deduction.hours).max(0.0);

    DayHours {
        date,
        raw_hours,
        maintenance_hours: deduction.hours,
        billable_hours,
        windows: deduction.windows,
    }
}
