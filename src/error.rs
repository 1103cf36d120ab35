use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::period::PeriodState;

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("Reservation {reservation_id} has an invalid span: end {end} is not after start {start}")]
    InvalidSpan {
        reservation_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Reservation {reservation_id} has no node reference")]
    MissingNode { reservation_id: String },

    #[error("Cost split override for reservation {reservation_id} sums to {actual} but computed billable hours are {expected}")]
    OverrideMismatch {
        reservation_id: String,
        expected: f64,
        actual: f64,
    },

    #[error("Reservation references unknown project {project_id}")]
    UnknownProject { project_id: String },

    #[error("Invalid period transition from {from:?} to {to:?}")]
    InvalidPeriodTransition { from: PeriodState, to: PeriodState },

    #[error("Report generation was cancelled")]
    Cancelled,

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, BillingError>;
