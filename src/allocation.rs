use crate::schema::CostAllocationSnapshot;
use chrono::{DateTime, Utc};

/// Sentinel cost object for hours billed on days with no active snapshot.
/// Such hours are surfaced under this id rather than dropped.
pub const UNALLOCATED: &str = "UNALLOCATED";

/// Append-only log of one project's cost-allocation snapshots, ordered for
/// binary-search lookup of the snapshot active at any instant.
#[derive(Debug, Clone, Default)]
pub struct AllocationTimeline {
    snapshots: Vec<CostAllocationSnapshot>,
}

impl AllocationTimeline {
    pub fn new(mut snapshots: Vec<CostAllocationSnapshot>) -> Self {
        // Ascending by creation instant; equal instants ordered by id
        // descending, so the last entry at-or-before an instant is the
        // lexicographically smallest id of the tied group.
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(b.id.cmp(&a.id)));
        Self { snapshots }
    }

    pub fn push(&mut self, snapshot: CostAllocationSnapshot) {
        let at = self.snapshots.partition_point(|s| {
            s.created_at < snapshot.created_at
                || (s.created_at == snapshot.created_at && s.id > snapshot.id)
        });
        self.snapshots.insert(at, snapshot);
    }

    /// The snapshot with the latest `created_at <= instant`, ties broken by
    /// smallest id. `None` when no snapshot exists yet at that instant.
    pub fn active_at(&self, instant: DateTime<Utc>) -> Option<&CostAllocationSnapshot> {
        let idx = self.snapshots.partition_point(|s| s.created_at <= instant);
        if idx == 0 {
            None
        } else {
            Some(&self.snapshots[idx - 1])
        }
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}

/// Allocate a day's billable hours across a snapshot's cost objects,
/// `hours * percentage / 100` each, in full precision. Callers accumulate
/// across days and round only the final totals.
pub fn split_hours(hours: f64, snapshot: &CostAllocationSnapshot) -> Vec<(String, f64)> {
    snapshot
        .cost_objects
        .iter()
        .map(|share| {
            (
                share.cost_object_id.clone(),
                hours * share.percentage / 100.0,
            )
        })
        .collect()
}
