//! Check stage: validate the payload, then persist it.

use std::path::PathBuf;
use std::sync::Arc;

use super::context::PipelineContext;
use crate::error::{CheckError, ValidationError};
use crate::item::Item;

/// Validate and persist one fetched item
///
/// Runs without an admission gate unless `max_concurrent_checks` is set.
/// Any failure, including a panic in a collaborator, ends the item in
/// `CheckingFailed` and spawns its fallback.
pub(crate) async fn run_check(ctx: Arc<PipelineContext>, item: Arc<Item>) {
    let _permit = match &ctx.check_slots {
        Some(slots) => match slots.acquire().await {
            Ok(permit) => Some(permit),
            Err(e) => {
                tracing::error!(item = %item.name(), error = %e, "check gate closed");
                return;
            }
        },
        None => None,
    };

    if let Err(e) = item.begin_check() {
        tracing::error!(item = %item.name(), error = %e, "cannot start check");
        return;
    }

    let outcome = match tokio::spawn(check_payload(Arc::clone(&ctx), Arc::clone(&item))).await {
        Ok(outcome) => outcome,
        Err(join_error) => Err(CheckError::Panicked(join_error.to_string())),
    };

    match outcome {
        Ok(path) => {
            if let Err(e) = item.complete() {
                tracing::error!(item = %item.name(), error = %e, "cannot record check");
                return;
            }
            match path {
                Some(path) => {
                    tracing::debug!(item = %item.name(), path = %path.display(), "document saved")
                }
                None => tracing::debug!(item = %item.name(), "document valid, not written"),
            }
        }
        Err(check_error) => {
            tracing::warn!(item = %item.name(), error = %check_error, "check failed");
            match item.fail_check(check_error.to_string()) {
                Ok(()) => ctx.spawn_fallback(&item),
                Err(e) => tracing::error!(item = %item.name(), error = %e, "cannot record check"),
            }
        }
    }
}

async fn check_payload(
    ctx: Arc<PipelineContext>,
    item: Arc<Item>,
) -> std::result::Result<Option<PathBuf>, CheckError> {
    let payload = item.payload().ok_or(ValidationError::MissingHeader)?;
    ctx.validator.validate(Arc::clone(&payload)).await?;
    ctx.persister.persist(item.name(), &payload).await
}
