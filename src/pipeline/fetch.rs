//! Fetch stage: admission-gated network retrieval.

use std::sync::Arc;

use super::context::PipelineContext;
use crate::item::Item;

/// Fetch one item while holding an admission slot
///
/// The slot is held exactly while the item is `Downloading`: it is taken before
/// the item enters that status and released after the item has left it.
pub(crate) async fn run_fetch(ctx: Arc<PipelineContext>, item: Arc<Item>) {
    let permit = match ctx.fetch_slots.acquire().await {
        Ok(permit) => permit,
        Err(e) => {
            tracing::error!(item = %item.name(), error = %e, "fetch gate closed");
            return;
        }
    };

    if let Err(e) = item.begin_download(ctx.clock.elapsed_millis()) {
        tracing::error!(item = %item.name(), error = %e, "cannot start fetch");
        return;
    }
    tracing::debug!(item = %item.name(), source = %item.primary_source(), "fetch started");

    let result = ctx.fetcher.fetch(item.primary_source()).await;
    let now = ctx.clock.elapsed_millis();

    match result {
        Ok(bytes) => {
            let size = bytes.len();
            let recorded = item.finish_download(bytes, now);
            drop(permit);
            match recorded {
                Ok(()) => {
                    tracing::debug!(item = %item.name(), size, "fetch finished");
                    ctx.spawn_check(item);
                }
                Err(e) => tracing::error!(item = %item.name(), error = %e, "cannot record fetch"),
            }
        }
        Err(fetch_error) => {
            tracing::warn!(
                item = %item.name(),
                source = %item.primary_source(),
                error = %fetch_error,
                "fetch failed"
            );
            let recorded = item.fail_download(fetch_error.to_string(), now);
            drop(permit);
            match recorded {
                Ok(()) => ctx.spawn_fallback(&item),
                Err(e) => tracing::error!(item = %item.name(), error = %e, "cannot record fetch"),
            }
        }
    }
}
