//! Shared state of one pipeline run, and the task spawners that hand items
//! from stage to stage.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::{check, fetch};
use crate::fetcher::Fetcher;
use crate::item::Item;
use crate::persister::Persister;
use crate::progress::ProgressSink;
use crate::types::Clock;
use crate::validator::Validator;

/// Everything the fetch and check tasks of a run share
pub(crate) struct PipelineContext {
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) validator: Validator,
    pub(crate) persister: Arc<dyn Persister>,
    /// Admission gate of the fetch stage
    pub(crate) fetch_slots: Semaphore,
    /// Optional gate of the check stage
    pub(crate) check_slots: Option<Semaphore>,
    pub(crate) clock: Clock,
    tracker: TaskTracker,
    /// Every item of the run, originals first, fallbacks appended as spawned
    items: Mutex<Vec<Arc<Item>>>,
    fallbacks: AtomicUsize,
    report_dirty: AtomicBool,
}

impl PipelineContext {
    pub(crate) fn new(
        fetcher: Arc<dyn Fetcher>,
        validator: Validator,
        persister: Arc<dyn Persister>,
        max_fetches: usize,
        max_checks: Option<usize>,
        clock: Clock,
        items: Vec<Arc<Item>>,
    ) -> Self {
        Self {
            fetcher,
            validator,
            persister,
            fetch_slots: Semaphore::new(max_fetches),
            check_slots: max_checks.map(Semaphore::new),
            clock,
            tracker: TaskTracker::new(),
            items: Mutex::new(items),
            fallbacks: AtomicUsize::new(0),
            report_dirty: AtomicBool::new(false),
        }
    }

    /// Queue an item for the fetch stage
    pub(crate) fn spawn_fetch(self: &Arc<Self>, item: Arc<Item>) {
        self.tracker.spawn(fetch::run_fetch(Arc::clone(self), item));
    }

    /// Hand a fetched item to the check stage
    pub(crate) fn spawn_check(self: &Arc<Self>, item: Arc<Item>) {
        self.tracker.spawn(check::run_check(Arc::clone(self), item));
    }

    /// Create the fallback of a failed item, if it has one, and queue it for fetching
    pub(crate) fn spawn_fallback(self: &Arc<Self>, failed: &Item) {
        let Some(fallback) = failed.spawn_fallback() else {
            return;
        };
        let fallback = Arc::new(fallback);
        tracing::info!(
            item = %fallback.name(),
            source = %fallback.primary_source(),
            "retrying from fallback source"
        );
        self.lock_items().push(Arc::clone(&fallback));
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        self.report_dirty.store(true, Ordering::Release);
        self.spawn_fetch(fallback);
    }

    /// Wait until every item, including fallbacks spawned along the way, is finished
    pub(crate) async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Shallow copy of the item list
    pub(crate) fn items(&self) -> Vec<Arc<Item>> {
        self.lock_items().clone()
    }

    /// Number of fallback items spawned so far
    pub(crate) fn fallback_count(&self) -> usize {
        self.fallbacks.load(Ordering::Relaxed)
    }

    /// Whether fallbacks were added since the last call
    fn take_report_dirty(&self) -> bool {
        self.report_dirty.swap(false, Ordering::AcqRel)
    }

    fn lock_items(&self) -> MutexGuard<'_, Vec<Arc<Item>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Spawn a background task that hands the sink a fresh item list whenever
/// fallbacks have been added.
pub(crate) fn spawn_report_refresher(
    ctx: Arc<PipelineContext>,
    sink: Arc<dyn ProgressSink>,
    refresh_interval: Duration,
    cancel_token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if ctx.take_report_dirty() {
                        sink.set_report(&ctx.items());
                    }
                }
                _ = cancel_token.cancelled() => {
                    break;
                }
            }
        }
    })
}
