use crate::error::{BillingError, Result};
use crate::interval::Interval;
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(BillingError::InvalidMonth(month));
    }
    Ok(())
}

pub fn month_start(year: i32, month: u32) -> Result<DateTime<Utc>> {
    validate_month(month)?;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| BillingError::DateError(format!("Unrepresentable month start {year}-{month:02}")))
}

pub fn next_month_start(year: i32, month: u32) -> Result<DateTime<Utc>> {
    validate_month(month)?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    month_start(next_year, next_month)
}

/// The half-open span covering one calendar month, `[first midnight, next month's first midnight)`.
pub fn month_span(year: i32, month: u32) -> Result<Interval> {
    Ok(Interval::new(
        month_start(year, month)?,
        next_month_start(year, month)?,
    ))
}

/// The half-open span covering one calendar day in UTC.
pub fn day_span(date: NaiveDate) -> Interval {
    let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let end = date
        .checked_add_days(Days::new(1))
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    Interval::new(start, end)
}

/// Every calendar day whose day-span intersects the given span, in chronological order.
pub fn days_covered(span: &Interval) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    if span.is_empty() {
        return days;
    }

    let mut current = span.start.date_naive();
    while day_span(current).start < span.end {
        days.push(current);
        current = current.checked_add_days(Days::new(1)).unwrap();
    }
    days
}

/// Display rounding for final totals. Intermediate values are never rounded.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn days_in_month(year: i32, month: u32) -> Result<i64> {
    let span = month_span(year, month)?;
    Ok((span.end - span.start).num_days())
}
