//! Progress reporting
//!
//! The pipeline never renders anything itself. It drives a [`ProgressSink`],
//! which polls item snapshots on its own schedule.
//!
//! ## Submodules
//!
//! - [`traits`] - the [`ProgressSink`] contract
//! - [`console`] - [`ConsoleMonitor`], a text histogram for terminals
//! - [`noop`] - [`NoOpMonitor`], for callers without a display

use serde::Serialize;
use std::cmp::Reverse;
use std::sync::Arc;

use crate::item::Item;
use crate::types::{Clock, Status};

pub mod console;
pub mod noop;
pub mod traits;

pub use console::ConsoleMonitor;
pub use noop::NoOpMonitor;
pub use traits::ProgressSink;

/// A failed item as shown in the recent-errors list
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecentFailure {
    /// Item name
    pub name: String,
    /// Failure text
    pub error: String,
    /// When the item stopped, on the run clock
    pub stop_millis: u64,
    /// Time since it stopped; `None` when it stopped after the view was taken
    pub age_millis: Option<u64>,
}

/// Aggregate view of a batch at one instant
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    /// Run clock reading when the view was taken
    pub elapsed_millis: u64,
    /// Number of items looked at
    pub total: usize,
    /// Items per status, indexed like [`Status::ALL`]
    pub counts: [usize; 6],
    /// Newest failures first
    pub recent_failures: Vec<RecentFailure>,
    /// Failures left out of `recent_failures`
    pub omitted_failures: usize,
}

impl ProgressSummary {
    /// Number of items in `status`
    pub fn count(&self, status: Status) -> usize {
        self.counts[status as usize]
    }
}

/// Build a [`ProgressSummary`] from one snapshot per item
///
/// Failures are ordered by stop time, newest first, and by name descending when
/// two stopped in the same millisecond.
pub fn summarize(clock: &Clock, items: &[Arc<Item>], max_recent: usize) -> ProgressSummary {
    let now = clock.elapsed_millis();
    let mut summary = ProgressSummary {
        elapsed_millis: now,
        total: items.len(),
        ..ProgressSummary::default()
    };

    let mut failures = Vec::new();
    for item in items {
        let snap = item.snapshot();
        summary.counts[snap.status as usize] += 1;
        if snap.status.is_failure() {
            failures.push(RecentFailure {
                age_millis: now.checked_sub(snap.stop_millis),
                stop_millis: snap.stop_millis,
                error: snap.error.unwrap_or_default(),
                name: snap.name,
            });
        }
    }

    failures.sort_by_key(|f| (Reverse(f.stop_millis), Reverse(f.name.clone())));
    summary.omitted_failures = failures.len().saturating_sub(max_recent);
    failures.truncate(max_recent);
    summary.recent_failures = failures;
    summary
}
