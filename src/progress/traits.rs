//! Trait definition for progress sinks

use async_trait::async_trait;
use std::sync::Arc;

use crate::item::Item;
use crate::types::Clock;

/// Receiver of whole-batch progress
///
/// The pipeline hands a sink a shallow copy of the item list: the `Arc`s are
/// copied, the items are not. Items keep changing while a sink looks at them,
/// so implementations must read each one through [`Item::snapshot`] and never
/// assume two snapshots agree.
///
/// A sink must not hold its own lock while taking item snapshots.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Replace the working copy of the item list
    fn set_report(&self, items: &[Arc<Item>]);

    /// Change the display heading
    fn set_title(&self, title: &str);

    /// Emit one aggregate view of `items`
    fn render_once(&self, clock: &Clock, items: &[Arc<Item>]);

    /// Render the working copy periodically until [`ProgressSink::stop`] is called
    async fn run_loop(&self, clock: Clock);

    /// Ask [`ProgressSink::run_loop`] to return after its current iteration
    fn stop(&self);
}
