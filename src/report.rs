use crate::period::PeriodState;
use crate::schema::CostObjectHours;
use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One day of one reservation, as computed. Kept on every line so a billing
/// manager can trace exactly where each hour came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DayAudit {
    pub date: NaiveDate,
    pub raw_hours: f64,
    pub maintenance_hours: f64,
    pub billable_hours: f64,
    /// Cost-allocation snapshot that was active for this day, if any.
    pub snapshot_id: Option<String>,
}

/// The audit diff of an applied override: what was computed, what replaced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverrideChange {
    Hours {
        original_hours: f64,
        override_hours: f64,
    },
    CostSplit {
        original_breakdown: Vec<CostObjectHours>,
        override_breakdown: Vec<CostObjectHours>,
    },
    Exclude {
        original_hours: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AppliedOverride {
    pub author: String,
    pub at: DateTime<Utc>,
    pub notes: String,
    #[serde(flatten)]
    pub change: OverrideChange,
}

/// One reservation's contribution to one month. Newly constructed on every
/// computation, never persisted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InvoiceLine {
    pub reservation_id: String,
    pub node: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub raw_hours: f64,
    pub maintenance_deduction: f64,
    pub billable_hours: f64,
    pub excluded: bool,
    pub cost_breakdown: Vec<CostObjectHours>,
    #[serde(rename = "override")]
    pub applied_override: Option<AppliedOverride>,
    pub days: Vec<DayAudit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProjectInvoice {
    pub project_id: String,
    pub project_title: String,
    pub project_owner: String,
    /// Billable hours of non-excluded lines.
    pub total_hours: f64,
    /// Per-cost-object hour totals of non-excluded lines.
    pub cost_totals: BTreeMap<String, f64>,
    pub lines: Vec<InvoiceLine>,
}

/// A reservation that could not be computed. The batch continues without it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportError {
    pub reservation_id: String,
    pub message: String,
}

/// A degraded-but-computed condition a human should resolve, such as billed
/// days with no active cost allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportWarning {
    pub reservation_id: String,
    pub message: String,
}

/// The monthly invoice report consumed by downstream rendering layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub year: i32,
    pub month: u32,
    pub generated_at: DateTime<Utc>,
    pub generated_by: String,
    pub finalize_state: PeriodState,
    /// Approved reservations considered, including excluded and errored ones.
    pub total_reservations: usize,
    pub excluded_count: usize,
    pub errors: Vec<ReportError>,
    pub warnings: Vec<ReportWarning>,
    pub projects: Vec<ProjectInvoice>,
}

impl Report {
    pub fn project(&self, project_id: &str) -> Option<&ProjectInvoice> {
        self.projects.iter().find(|p| p.project_id == project_id)
    }

    /// Excluded lines across all projects, for transparency display.
    pub fn excluded_lines(&self) -> impl Iterator<Item = &InvoiceLine> {
        self.projects
            .iter()
            .flat_map(|p| p.lines.iter())
            .filter(|l| l.excluded)
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
