//! # Reservation Billing
//!
//! A library for converting raw GPU node reservations into monthly invoices
//! with maintenance proration, snapshot-based cost allocation, and audited
//! manual overrides.
//!
//! ## Core Concepts
//!
//! - **Billable hours**: reservation duration minus scheduled-maintenance
//!   overlap, computed one calendar day at a time
//! - **Cost allocation snapshots**: frozen point-in-time records of a
//!   project's percentage split across funding cost objects; each day resolves
//!   the snapshot active at its start, so mid-reservation changes attribute
//!   correctly
//! - **Overrides**: billing-manager corrections (explicit hours, explicit cost
//!   split, or full exclusion) applied on top of computed lines, with the
//!   original values retained for audit
//! - **Invoice periods**: (year, month) units with a draft/finalize/reopen
//!   state machine
//!
//! The engine is stateless and side-effect-free: it reads immutable,
//! pre-fetched records through read-only repository traits and produces a new
//! [`Report`] structure. No I/O, no database, no hidden clock — "now" is
//! injected.
//!
//! ## Example
//!
//! ```rust,ignore
//! use reservation_billing::*;
//! use chrono::{TimeZone, Utc};
//!
//! let dataset = BillingDataset::new()
//!     .with_project(Project {
//!         id: "p-climate".to_string(),
//!         title: "Climate Simulation".to_string(),
//!         owner: "pi@example.org".to_string(),
//!     })
//!     .with_reservation(Reservation {
//!         id: "r-1".to_string(),
//!         project_id: "p-climate".to_string(),
//!         node: "gpu-01".to_string(),
//!         start: Utc.with_ymd_and_hms(2023, 2, 14, 16, 0, 0).unwrap(),
//!         end: Utc.with_ymd_and_hms(2023, 2, 16, 9, 0, 0).unwrap(),
//!         status: ReservationStatus::Approved,
//!     });
//!
//! let period = InvoicePeriod::new(2023, 2)?;
//! let options = GenerateOptions::new("billing-bot", Utc::now());
//! let report = BillingEngine::generate_monthly_report(&dataset, &period, &options)?;
//! ```

pub mod allocation;
pub mod daily;
pub mod engine;
pub mod error;
pub mod ingestion;
pub mod interval;
pub mod maintenance;
pub mod overrides;
pub mod period;
pub mod report;
pub mod repository;
pub mod schema;
pub mod utils;

pub use allocation::{split_hours, AllocationTimeline, UNALLOCATED};
pub use daily::{day_hours, DayHours};
pub use engine::{CancelToken, GenerateOptions, InvoiceAssembler};
pub use error::{BillingError, Result};
pub use ingestion::*;
pub use interval::Interval;
pub use maintenance::{window_phase, MaintenanceOverlap, WindowPhase};
pub use overrides::apply_override;
pub use period::{InvoicePeriod, PeriodState};
pub use report::*;
pub use repository::*;
pub use schema::*;
pub use utils::*;

use log::{debug, info};

pub struct BillingEngine;

impl BillingEngine {
    /// Convenience entry point over a prefetched in-memory dataset.
    pub fn generate_monthly_report(
        dataset: &BillingDataset,
        period: &InvoicePeriod,
        options: &GenerateOptions,
    ) -> Result<Report> {
        info!(
            "Processing billing for period {}-{:02} on behalf of {}",
            period.year, period.month, options.generated_by
        );

        let report = InvoiceAssembler::for_dataset(dataset).generate_report(period, options)?;

        debug!(
            "Period {}-{:02}: {} projects, {} reservations, {} excluded, {} errors, {} warnings",
            report.year,
            report.month,
            report.projects.len(),
            report.total_reservations,
            report.excluded_count,
            report.errors.len(),
            report.warnings.len()
        );

        Ok(report)
    }
}

pub fn generate_monthly_report(
    dataset: &BillingDataset,
    period: &InvoicePeriod,
    options: &GenerateOptions,
) -> Result<Report> {
    BillingEngine::generate_monthly_report(dataset, period, options)
}
