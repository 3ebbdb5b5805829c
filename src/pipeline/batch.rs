//! Batch setup and report assembly: the synchronous ends of a run.

use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{ColumnConfig, SkipPolicy};
use crate::error::{Error, Result};
use crate::item::Item;
use crate::table::Table;
use crate::types::{InputRow, ReportRow, RunSummary, Status};

const YES: &str = "Yes";
const NO: &str = "No";

fn flag(value: bool) -> String {
    if value { YES } else { NO }.to_string()
}

/// Read the name, primary and fallback columns of the input table
///
/// # Errors
/// [`Error::InputMismatch`] if the three columns differ in length
pub fn read_input_rows(table: &dyn Table, columns: &ColumnConfig) -> Result<Vec<InputRow>> {
    let names = table.get_column(&columns.name);
    let primary = table.get_column(&columns.primary);
    let fallback = table.get_column(&columns.fallback);

    if names.len() != primary.len() || names.len() != fallback.len() {
        return Err(Error::InputMismatch {
            names: names.len(),
            primary: primary.len(),
            fallback: fallback.len(),
        });
    }

    Ok(names
        .into_iter()
        .zip(primary)
        .zip(fallback)
        .map(|((name, primary), fallback)| InputRow::new(name, primary, Some(fallback)))
        .collect())
}

/// Names the metadata table records as already handled
pub fn completed_names(
    metadata: &dyn Table,
    columns: &ColumnConfig,
    policy: SkipPolicy,
) -> HashSet<String> {
    let names = metadata.get_column(&columns.report_name);
    match policy {
        SkipPolicy::AnyRecorded => names.into_iter().filter(|n| !n.is_empty()).collect(),
        SkipPolicy::DownloadedOnly => {
            let downloaded = metadata.get_column(&columns.report_downloaded);
            names
                .into_iter()
                .zip(downloaded)
                .filter(|(name, done)| !name.is_empty() && done == YES)
                .map(|(name, _)| name)
                .collect()
        }
    }
}

/// Turn input rows into waiting items
///
/// Rows are taken in order. Names in `completed` and rows with a blank name are
/// skipped; admission stops after `max_items` items (`None` = no limit).
pub fn build_items(
    rows: &[InputRow],
    completed: &HashSet<String>,
    max_items: Option<usize>,
) -> Vec<Arc<Item>> {
    let limit = max_items.unwrap_or(usize::MAX);
    let mut items = Vec::new();

    for row in rows {
        if items.len() >= limit {
            break;
        }
        if row.name.trim().is_empty() {
            tracing::debug!(source = %row.primary, "skipping row without a name");
            continue;
        }
        if completed.contains(&row.name) {
            continue;
        }
        items.push(Arc::new(Item::new(
            row.name.clone(),
            row.primary.clone(),
            row.fallback.clone(),
        )));
    }

    items
}

/// Sort by name, each original directly before its fallback
///
/// The sort is stable, so rows with equal keys keep their spawn order.
pub fn sort_items(items: &mut [Arc<Item>]) {
    items.sort_by(|a, b| a.report_order(b));
}

/// One report row per item, in the given order
pub fn report_rows(items: &[Arc<Item>]) -> Vec<ReportRow> {
    items
        .iter()
        .map(|item| {
            let snap = item.snapshot();
            ReportRow {
                used_fallback: snap.is_fallback,
                downloaded: snap.status == Status::Done,
                error: snap.error.unwrap_or_default(),
                name: snap.name,
            }
        })
        .collect()
}

/// Append report rows to the four report columns
pub fn write_report(table: &mut dyn Table, columns: &ColumnConfig, rows: &[ReportRow]) {
    let names: Vec<String> = rows.iter().map(|r| r.name.clone()).collect();
    let fallbacks: Vec<String> = rows.iter().map(|r| flag(r.used_fallback)).collect();
    let downloaded: Vec<String> = rows.iter().map(|r| flag(r.downloaded)).collect();
    let errors: Vec<String> = rows.iter().map(|r| r.error.clone()).collect();

    table.add_column(&columns.report_name, &names);
    table.add_column(&columns.report_fallback, &fallbacks);
    table.add_column(&columns.report_downloaded, &downloaded);
    table.add_column(&columns.report_error, &errors);
}

/// Tally final statuses
pub fn summarize_run(items: &[Arc<Item>], admitted: usize, fallbacks: usize) -> RunSummary {
    let mut summary = RunSummary {
        admitted,
        fallbacks,
        ..RunSummary::default()
    };
    for item in items {
        match item.status() {
            Status::Done => summary.done += 1,
            Status::DownloadFailed => summary.download_failed += 1,
            Status::CheckingFailed => summary.checking_failed += 1,
            _ => {}
        }
    }
    summary
}
