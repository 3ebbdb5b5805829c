//! # pdf-dl
//!
//! Concurrent batch downloader for PDF documents with fallback sources.
//!
//! ## Design Philosophy
//!
//! pdf-dl is designed to be:
//! - **Bounded where it matters** - Network fetches pass an admission gate; validation
//!   and writing do not wait on it
//! - **Failure-contained** - One document failing never aborts the batch; it gets
//!   exactly one retry from its fallback source
//! - **Observable without locks** - Progress sinks poll per-item snapshots and never
//!   block the pipeline
//! - **Library-first** - The `pdf-dl` binary is a thin front end over [`DownloadManager`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use pdf_dl::{Config, DownloadManager, NoOpMonitor, SqliteTable, TableMode};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = DownloadManager::new(Config::default()).await?;
//!
//!     let input = SqliteTable::open("input.db", TableMode::ReadOnly).await?;
//!     let mut report = SqliteTable::open("metadata.db", TableMode::ReadWrite).await?;
//!
//!     let summary = manager.run(&input, &mut report, Arc::new(NoOpMonitor)).await?;
//!     println!("{} saved, {} failed", summary.done,
//!         summary.download_failed + summary.checking_failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Document retrieval
pub mod fetcher;
/// Per-document work item and state machine
pub mod item;
/// Writing validated documents
pub mod persister;
/// Fetch, validate and persist pipeline
pub mod pipeline;
/// Progress reporting
pub mod progress;
/// Tabular input and report storage
pub mod table;
/// Core types
pub mod types;
/// Structural document validation
pub mod validator;

// Re-export commonly used types
pub use config::{ColumnConfig, Config, FetchConfig, ProgressConfig, SkipPolicy};
pub use error::{CheckError, Error, FetchError, Result, TableError, ValidationError};
pub use fetcher::{Fetcher, HttpFetcher};
pub use item::Item;
pub use persister::{FsPersister, NoOpPersister, Persister};
pub use pipeline::DownloadManager;
pub use progress::{ConsoleMonitor, NoOpMonitor, ProgressSink, ProgressSummary};
pub use table::{Grid, MemoryTable, SqliteTable, Table, TableMode};
pub use types::{Clock, InputRow, ItemSnapshot, ReportRow, RunSummary, Status};
pub use validator::{DocumentParser, LopdfParser, Validator};
