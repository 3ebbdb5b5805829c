//! No-op progress sink

use async_trait::async_trait;
use std::sync::Arc;

use super::traits::ProgressSink;
use crate::item::Item;
use crate::types::Clock;

/// Progress sink that discards everything
///
/// Used by library callers that have no display. `run_loop` returns immediately.
///
/// # Examples
///
/// ```
/// use pdf_dl::progress::{NoOpMonitor, ProgressSink};
///
/// let sink = NoOpMonitor;
/// sink.set_title("(step 1/2) Downloading documents");
/// sink.stop();
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMonitor;

#[async_trait]
impl ProgressSink for NoOpMonitor {
    fn set_report(&self, _items: &[Arc<Item>]) {}

    fn set_title(&self, _title: &str) {}

    fn render_once(&self, _clock: &Clock, _items: &[Arc<Item>]) {}

    async fn run_loop(&self, _clock: Clock) {}

    fn stop(&self) {}
}
