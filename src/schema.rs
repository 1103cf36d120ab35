use crate::interval::Interval;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum ReservationStatus {
    #[schemars(description = "Awaiting approval. Not billable.")]
    Pending,

    #[schemars(description = "Approved by a project manager. The only billable status.")]
    Approved,

    #[schemars(description = "Rejected at review. Not billable.")]
    Rejected,

    #[schemars(description = "Cancelled by the requester before or during the rental. Not billable.")]
    Cancelled,
}

/// One node rental, as recorded by the reservation system. Immutable input:
/// the engine never changes a reservation, it only reads the span and status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Reservation {
    pub id: String,
    pub project_id: String,
    pub node: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn span(&self) -> Interval {
        Interval::new(self.start, self.end)
    }

    pub fn is_billable(&self) -> bool {
        self.status == ReservationStatus::Approved
    }
}

/// Project directory entry. Grouping metadata for invoice rendering; membership
/// and lifecycle live in the portal, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Project {
    pub id: String,
    pub title: String,
    pub owner: String,
}

/// A scheduled downtime announcement. Windows never change once past; multiple
/// windows may overlap each other and any reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MaintenanceWindow {
    pub title: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MaintenanceWindow {
    pub fn span(&self) -> Interval {
        Interval::new(self.start, self.end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CostObjectShare {
    #[schemars(description = "Funding/accounting code receiving this share of billed hours")]
    pub cost_object_id: String,

    #[schemars(description = "Share of the project's hours, 0-100. Shares across a snapshot sum to 100.")]
    pub percentage: f64,
}

/// A frozen record of how a project's charges were split at the moment an
/// allocation was approved. Valid from `created_at` until superseded by a later
/// snapshot for the same project. Percentage sums are enforced by the approving
/// collaborator at creation time and are not re-validated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CostAllocationSnapshot {
    pub id: String,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub cost_objects: Vec<CostObjectShare>,
}

/// One entry of a per-cost-object hour breakdown. Shared between override
/// payloads and report lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CostObjectHours {
    pub cost_object_id: String,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverrideKind {
    /// Replace the computed billable hours with an explicit value. The
    /// per-cost-object breakdown is rescaled to the original computed shares.
    Hours { hours: f64 },

    /// Replace the computed per-cost-object breakdown with explicit values,
    /// which must sum to the computed billable hours. Hours stay computed.
    CostSplit { breakdown: Vec<CostObjectHours> },

    /// Remove the reservation from the invoice entirely. It still appears in
    /// the report's excluded list with zero hours for transparency.
    Exclude,
}

/// A billing manager's correction to one computed invoice line, keyed by
/// (reservation, year, month). At most one override is active per key; creating
/// a newer one supersedes the prior, and old records are retained for audit by
/// the override store. The engine only ever reads the active one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceLineOverride {
    pub reservation_id: String,
    pub year: i32,
    pub month: u32,
    #[serde(flatten)]
    pub kind: OverrideKind,
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[schemars(description = "Free-text justification entered by the billing manager")]
    pub notes: String,
}
