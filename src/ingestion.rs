use crate::repository::BillingDataset;
use crate::schema::{
    CostAllocationSnapshot, CostObjectShare, InvoiceLineOverride, MaintenanceWindow, OverrideKind,
    Project, Reservation, ReservationStatus,
};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A datetime as the portal records it. The surrounding system stores naive
/// and timezone-aware values inconsistently; this is the single place where
/// that is resolved. Naive values are read as UTC.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInstant {
    Utc(DateTime<Utc>),
    Zoned(DateTime<FixedOffset>),
    Naive(NaiveDateTime),
}

impl RawInstant {
    pub fn into_utc(self) -> DateTime<Utc> {
        match self {
            RawInstant::Utc(instant) => instant,
            RawInstant::Zoned(instant) => instant.with_timezone(&Utc),
            RawInstant::Naive(instant) => instant.and_utc(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReservationRow {
    pub id: String,
    pub project_id: String,
    pub node: String,
    pub start: RawInstant,
    pub end: RawInstant,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMaintenanceRow {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start: RawInstant,
    pub end: RawInstant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSnapshotRow {
    pub id: String,
    pub project_id: String,
    pub created_at: RawInstant,
    pub cost_objects: Vec<CostObjectShare>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOverrideRow {
    pub reservation_id: String,
    pub year: i32,
    pub month: u32,
    #[serde(flatten)]
    pub kind: OverrideKind,
    pub author: String,
    pub created_at: RawInstant,
    #[serde(default)]
    pub notes: String,
}

/// Everything the portal hands the engine for one computation, pre-fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBillingExport {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub reservations: Vec<RawReservationRow>,
    #[serde(default)]
    pub maintenance_windows: Vec<RawMaintenanceRow>,
    #[serde(default)]
    pub snapshots: Vec<RawSnapshotRow>,
    #[serde(default)]
    pub overrides: Vec<RawOverrideRow>,
}

/// Normalizes a raw export into an in-memory dataset. Every datetime comes out
/// as a UTC instant; nothing downstream ever sees a naive or zoned value.
pub fn build_dataset(export: RawBillingExport) -> BillingDataset {
    let mut dataset = BillingDataset::new();

    for project in export.projects {
        dataset = dataset.with_project(project);
    }

    for row in export.reservations {
        dataset = dataset.with_reservation(Reservation {
            id: row.id,
            project_id: row.project_id,
            node: row.node,
            start: row.start.into_utc(),
            end: row.end.into_utc(),
            status: row.status,
        });
    }

    for row in export.maintenance_windows {
        dataset = dataset.with_maintenance_window(MaintenanceWindow {
            title: row.title,
            description: row.description,
            start: row.start.into_utc(),
            end: row.end.into_utc(),
        });
    }

    for row in export.snapshots {
        dataset = dataset.with_snapshot(CostAllocationSnapshot {
            id: row.id,
            project_id: row.project_id,
            created_at: row.created_at.into_utc(),
            cost_objects: row.cost_objects,
        });
    }

    for row in export.overrides {
        dataset = dataset.with_override(InvoiceLineOverride {
            reservation_id: row.reservation_id,
            year: row.year,
            month: row.month,
            kind: row.kind,
            author: row.author,
            created_at: row.created_at.into_utc(),
            notes: row.notes,
        });
    }

    dataset
}
