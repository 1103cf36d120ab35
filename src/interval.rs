use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A half-open datetime interval `[start, end)`.
///
/// Every overlap computation in the engine is built from [`Interval::intersect`],
/// applied with the same half-open convention throughout, so adjacent midnight
/// boundaries never double-count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// An interval is empty when it covers no instant at all.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// `[max(a,c), min(b,d))`, or `None` when the result would be empty.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start >= end {
            None
        } else {
            Some(Interval::new(start, end))
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// Duration in hours, with sub-second precision.
    pub fn hours(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        (self.end - self.start).num_milliseconds() as f64 / 3_600_000.0
    }

    /// Union-merge of a set of intervals: overlapping or touching intervals are
    /// coalesced, empty intervals discarded. The result is sorted and disjoint.
    pub fn merge(intervals: Vec<Interval>) -> Vec<Interval> {
        let mut intervals: Vec<Interval> =
            intervals.into_iter().filter(|i| !i.is_empty()).collect();
        intervals.sort_by_key(|i| i.start);

        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if interval.start <= last.end => {
                    last.end = last.end.max(interval.end);
                }
                _ => merged.push(interval),
            }
        }
        merged
    }
}
