//! Concurrent fetch, validate and persist pipeline.
//!
//! The [`DownloadManager`] runs a batch as one pool of tasks:
//! - [`fetch`] - admission-gated retrieval, one task per item
//! - [`check`] - validation and persisting, one task per fetched item
//! - [`context`] - state shared by those tasks and the spawners that hand
//!   items from one stage to the next
//! - [`batch`] - building items from tables and turning them back into a report
//!
//! A failed item spawns at most one fallback item, which re-enters the fetch
//! stage like any other. A run ends once every item, fallbacks included, is
//! terminal.

mod batch;
mod check;
mod context;
mod fetch;


pub use batch::{
    build_items, completed_names, read_input_rows, report_rows, sort_items, summarize_run,
    write_report,
};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::item::Item;
use crate::persister::{FsPersister, NoOpPersister, Persister};
use crate::progress::ProgressSink;
use crate::table::Table;
use crate::types::{Clock, RunSummary};
use crate::validator::Validator;
use context::{PipelineContext, spawn_report_refresher};

/// Title shown while items are in flight
pub const TITLE_DOWNLOADING: &str = "(step 1/2) Downloading documents";
/// Title shown while the report is written
pub const TITLE_SAVING: &str = "(step 2/2) Saving report";

/// Runs batches of items through the fetch and check stages
pub struct DownloadManager {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    validator: Validator,
    persister: Arc<dyn Persister>,
}

impl DownloadManager {
    /// Create a manager with the production HTTP fetcher, `lopdf` validator and
    /// file system persister
    ///
    /// Creates the output directory if it does not exist.
    ///
    /// # Errors
    /// Returns error if the configuration is invalid, the output directory cannot
    /// be created, or the HTTP client cannot be built
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let persister: Arc<dyn Persister> = match &config.output_dir {
            Some(dir) => {
                if !tokio::fs::try_exists(dir).await.unwrap_or(false) {
                    tracing::info!(path = %dir.display(), "creating output directory");
                }
                tokio::fs::create_dir_all(dir).await?;
                Arc::new(FsPersister::new(dir.clone()))
            }
            None => {
                tracing::warn!("no output directory configured, documents will not be written");
                Arc::new(NoOpPersister)
            }
        };

        let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
        Self::with_components(config, fetcher, Validator::default(), persister)
    }

    /// Create a manager around explicit collaborators
    ///
    /// # Errors
    /// Returns error if the configuration is invalid
    pub fn with_components(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        validator: Validator,
        persister: Arc<dyn Persister>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            fetcher,
            validator,
            persister,
        })
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Download every new item of `url_table` and append the outcome to `metadata_table`
    ///
    /// Names already recorded in `metadata_table` (per
    /// [`SkipPolicy`](crate::config::SkipPolicy)) are skipped. The sink is driven
    /// for the whole run and given one final frame after the report is saved.
    ///
    /// # Errors
    /// Returns [`Error::InputMismatch`](crate::Error::InputMismatch) before
    /// anything is fetched if the input columns differ in length, or a table
    /// error if the report cannot be saved. Failures of single items never
    /// abort the run.
    pub async fn run(
        &self,
        url_table: &dyn Table,
        metadata_table: &mut dyn Table,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<RunSummary> {
        let columns = &self.config.columns;
        let rows = read_input_rows(url_table, columns)?;
        let completed = completed_names(&*metadata_table, columns, self.config.skip_policy);
        let items = build_items(&rows, &completed, self.config.max_items);
        let admitted = items.len();

        tracing::info!(
            rows = rows.len(),
            already_completed = completed.len(),
            admitted,
            max_concurrent_fetches = self.config.fetch.max_concurrent_fetches,
            max_bandwidth_mbps = ?self.config.fetch.max_bandwidth_mbps,
            "starting run"
        );

        let clock = Clock::start();
        sink.set_title(TITLE_DOWNLOADING);
        sink.set_report(&items);
        let display = {
            let sink = Arc::clone(&sink);
            tokio::spawn(async move { sink.run_loop(clock).await })
        };

        let (all, fallbacks) = self.process_counted(items, Arc::clone(&sink), clock).await;

        sink.set_title(TITLE_SAVING);
        write_report(metadata_table, columns, &report_rows(&all));
        let saved = metadata_table.save().await;

        sink.stop();
        if let Err(e) = display.await {
            tracing::warn!(error = %e, "progress display task failed");
        }
        sink.render_once(&clock, &all);

        saved?;

        let mut summary = summarize_run(&all, admitted, fallbacks);
        summary.elapsed_millis = clock.elapsed_millis();
        tracing::info!(
            admitted = summary.admitted,
            fallbacks = summary.fallbacks,
            done = summary.done,
            download_failed = summary.download_failed,
            checking_failed = summary.checking_failed,
            elapsed_ms = summary.elapsed_millis,
            "run finished"
        );
        Ok(summary)
    }

    /// Run prebuilt items through both stages and return every item, sorted
    ///
    /// The result holds the given items plus any fallbacks they spawned, in
    /// report order.
    pub async fn process(
        &self,
        items: Vec<Arc<Item>>,
        sink: Arc<dyn ProgressSink>,
        clock: Clock,
    ) -> Vec<Arc<Item>> {
        self.process_counted(items, sink, clock).await.0
    }

    async fn process_counted(
        &self,
        items: Vec<Arc<Item>>,
        sink: Arc<dyn ProgressSink>,
        clock: Clock,
    ) -> (Vec<Arc<Item>>, usize) {
        let ctx = Arc::new(PipelineContext::new(
            Arc::clone(&self.fetcher),
            self.validator.clone(),
            Arc::clone(&self.persister),
            self.config.fetch.max_concurrent_fetches,
            self.config.fetch.max_concurrent_checks,
            clock,
            items.clone(),
        ));

        let cancel_token = CancellationToken::new();
        let refresher = spawn_report_refresher(
            Arc::clone(&ctx),
            Arc::clone(&sink),
            self.config.progress.refresh_interval,
            cancel_token.clone(),
        );

        for item in items {
            ctx.spawn_fetch(item);
        }
        ctx.wait().await;

        cancel_token.cancel();
        if let Err(e) = refresher.await {
            tracing::warn!(error = %e, "report refresher task failed");
        }

        let mut all = ctx.items();
        for item in all.iter().filter(|item| !item.status().is_terminal()) {
            tracing::error!(
                item = %item.name(),
                status = ?item.status(),
                "item left the pipeline without a final status"
            );
        }
        sort_items(&mut all);
        sink.set_report(&all);
        (all, ctx.fallback_count())
    }
}
