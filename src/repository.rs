use crate::allocation::AllocationTimeline;
use crate::interval::Interval;
use crate::schema::{
    CostAllocationSnapshot, InvoiceLineOverride, MaintenanceWindow, Project, Reservation,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Read-only reservation lookup. Production implementations live in the
/// portal; the engine calls this as a pure lookup and never writes through it.
pub trait ReservationRepository: Sync {
    /// Reservations whose span intersects `span`. Malformed rows (end before
    /// start) are returned too, so the engine can surface them as data errors
    /// instead of losing them silently.
    fn find_overlapping(&self, span: &Interval) -> Vec<Reservation>;
}

pub trait MaintenanceWindowRepository: Sync {
    fn find_overlapping(&self, span: &Interval) -> Vec<MaintenanceWindow>;
}

pub trait CostAllocationRepository: Sync {
    /// The snapshot active for a project at an instant: latest `created_at`
    /// at-or-before the instant, ties broken by smallest id.
    fn active_snapshot_for(
        &self,
        project_id: &str,
        instant: DateTime<Utc>,
    ) -> Option<&CostAllocationSnapshot>;
}

pub trait OverrideRepository: Sync {
    /// The active override for a (reservation, year, month) key, if any.
    /// Creating a newer override supersedes the prior one.
    fn active_for(
        &self,
        reservation_id: &str,
        year: i32,
        month: u32,
    ) -> Option<&InvoiceLineOverride>;
}

pub trait ProjectRepository: Sync {
    fn project(&self, project_id: &str) -> Option<&Project>;
}

/// In-memory implementation of every collaborator trait. Callers prefetch all
/// records for the period into one of these before invoking the engine, which
/// keeps the engine free of I/O and trivially testable.
#[derive(Debug, Clone, Default)]
pub struct BillingDataset {
    projects: BTreeMap<String, Project>,
    reservations: Vec<Reservation>,
    maintenance: Vec<MaintenanceWindow>,
    allocations: BTreeMap<String, AllocationTimeline>,
    overrides: Vec<InvoiceLineOverride>,
}

impl BillingDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, project: Project) -> Self {
        self.projects.insert(project.id.clone(), project);
        self
    }

    pub fn with_reservation(mut self, reservation: Reservation) -> Self {
        self.reservations.push(reservation);
        self
    }

    pub fn with_maintenance_window(mut self, window: MaintenanceWindow) -> Self {
        self.maintenance.push(window);
        self
    }

    pub fn with_snapshot(mut self, snapshot: CostAllocationSnapshot) -> Self {
        self.allocations
            .entry(snapshot.project_id.clone())
            .or_default()
            .push(snapshot);
        self
    }

    pub fn with_override(mut self, record: InvoiceLineOverride) -> Self {
        self.overrides.push(record);
        self
    }
}

fn touches(start: DateTime<Utc>, end: DateTime<Utc>, span: &Interval) -> bool {
    start < span.end && end > span.start
}

impl ReservationRepository for BillingDataset {
    fn find_overlapping(&self, span: &Interval) -> Vec<Reservation> {
        self.reservations
            .iter()
            .filter(|r| touches(r.start, r.end, span))
            .cloned()
            .collect()
    }
}

impl MaintenanceWindowRepository for BillingDataset {
    fn find_overlapping(&self, span: &Interval) -> Vec<MaintenanceWindow> {
        self.maintenance
            .iter()
            .filter(|w| touches(w.start, w.end, span))
            .cloned()
            .collect()
    }
}

impl CostAllocationRepository for BillingDataset {
    fn active_snapshot_for(
        &self,
        project_id: &str,
        instant: DateTime<Utc>,
    ) -> Option<&CostAllocationSnapshot> {
        self.allocations.get(project_id)?.active_at(instant)
    }
}

impl OverrideRepository for BillingDataset {
    fn active_for(
        &self,
        reservation_id: &str,
        year: i32,
        month: u32,
    ) -> Option<&InvoiceLineOverride> {
        self.overrides
            .iter()
            .filter(|o| o.reservation_id == reservation_id && o.year == year && o.month == month)
            .max_by_key(|o| o.created_at)
    }
}

impl ProjectRepository for BillingDataset {
    fn project(&self, project_id: &str) -> Option<&Project> {
        self.projects.get(project_id)
    }
}
