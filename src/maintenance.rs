use crate::interval::Interval;
use crate::schema::MaintenanceWindow;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Total maintenance overlap of a time span, plus the windows that contributed
/// (kept for override/audit display).
#[derive(Debug, Clone, PartialEq)]
pub struct MaintenanceOverlap {
    pub hours: f64,
    pub windows: Vec<String>,
}

/// Overlap of `span` against a window set.
///
/// Per-window intersections are union-merged before summing, so two windows
/// announced over the same wall-clock downtime deduct it once. The
/// contributing-window list still names every window that individually
/// overlaps the span.
pub fn overlap(span: &Interval, windows: &[MaintenanceWindow]) -> MaintenanceOverlap {
    let mut contributing = Vec::new();
    let mut clipped = Vec::new();

    for window in windows {
        if let Some(hit) = span.intersect(&window.span()) {
            contributing.push(window.title.clone());
            clipped.push(hit);
        }
    }

    let hours = Interval::merge(clipped).iter().map(Interval::hours).sum();

    MaintenanceOverlap {
        hours,
        windows: contributing,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "PascalCase")]
pub enum WindowPhase {
    Upcoming,
    InProgress,
    Completed,
}

/// Display phase of a window relative to an injected "now". Pure function so
/// the engine carries no hidden time-dependence.
pub fn window_phase(window: &MaintenanceWindow, now: DateTime<Utc>) -> WindowPhase {
    if now < window.start {
        WindowPhase::Upcoming
    } else if now < window.end {
        WindowPhase::InProgress
    } else {
        WindowPhase::Completed
    }
}
