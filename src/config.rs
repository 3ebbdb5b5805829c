//! Configuration types for pdf-dl

use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

use crate::error::{Error, Result};

/// Network fetch settings
///
/// Groups settings for the admission-controlled fetch stage and the HTTP client.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum fetches in flight at once (default: 50)
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Optional cap on concurrent validate+persist tasks (None = one task per item, no gate)
    #[serde(default)]
    pub max_concurrent_checks: Option<usize>,

    /// Per-request timeout in milliseconds (None = wait forever)
    ///
    /// A stuck request keeps its admission slot until this elapses, so with the
    /// default a hung server can occupy a slot for the whole run.
    #[serde(default, with = "optional_duration_millis")]
    pub request_timeout: Option<Duration>,

    /// Connect timeout in milliseconds (None = transport default)
    #[serde(default, with = "optional_duration_millis")]
    pub connect_timeout: Option<Duration>,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Bandwidth hint in Mbit/s
    ///
    /// Recorded in the run log only. Throughput is bounded by
    /// `max_concurrent_fetches` alone.
    #[serde(default)]
    pub max_bandwidth_mbps: Option<u32>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_concurrent_checks: None,
            request_timeout: None,
            connect_timeout: None,
            user_agent: default_user_agent(),
            max_bandwidth_mbps: None,
        }
    }
}

/// Header names used to read the input tables and write the report
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnConfig {
    /// Item name column in the input table (default: "BRnum")
    #[serde(default = "default_name_column")]
    pub name: String,

    /// Primary source column (default: "Pdf_URL")
    #[serde(default = "default_primary_column")]
    pub primary: String,

    /// Fallback source column (default: "Database link")
    #[serde(default = "default_fallback_column")]
    pub fallback: String,

    /// Item name column in the report and metadata table (default: "BRnum")
    #[serde(default = "default_name_column")]
    pub report_name: String,

    /// Fallback flag column (default: "Fallback")
    #[serde(default = "default_used_fallback_column")]
    pub report_fallback: String,

    /// Downloaded flag column (default: "Downloaded")
    #[serde(default = "default_downloaded_column")]
    pub report_downloaded: String,

    /// Error text column (default: "Error")
    #[serde(default = "default_error_column")]
    pub report_error: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            name: default_name_column(),
            primary: default_primary_column(),
            fallback: default_fallback_column(),
            report_name: default_name_column(),
            report_fallback: default_used_fallback_column(),
            report_downloaded: default_downloaded_column(),
            report_error: default_error_column(),
        }
    }
}

/// Which metadata rows count as already completed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// Any name recorded in the metadata table is skipped, whatever its outcome
    #[default]
    AnyRecorded,
    /// Only names recorded with `Downloaded = Yes` are skipped
    DownloadedOnly,
}

/// Progress rendering settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProgressConfig {
    /// Interval between renders in milliseconds (default: 1000)
    #[serde(default = "default_refresh_interval", with = "duration_millis")]
    pub refresh_interval: Duration,

    /// Number of recent failures shown (default: 10)
    #[serde(default = "default_max_recent_errors")]
    pub max_recent_errors: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            max_recent_errors: default_max_recent_errors(),
        }
    }
}

/// Main configuration for [`DownloadManager`](crate::DownloadManager)
///
/// Every field has a default, so `{}` is a valid configuration file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Fetch stage and HTTP client settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Maximum number of new items admitted per run (None = all)
    #[serde(default)]
    pub max_items: Option<usize>,

    /// Directory validated documents are written to (default: "Downloads")
    ///
    /// `None` skips writing: validated documents are still marked done.
    #[serde(default = "default_output_dir")]
    pub output_dir: Option<PathBuf>,

    /// Table header names
    #[serde(default)]
    pub columns: ColumnConfig,

    /// How the metadata table filters already-completed names
    #[serde(default)]
    pub skip_policy: SkipPolicy,

    /// Progress rendering settings
    #[serde(default)]
    pub progress: ProgressConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            max_items: None,
            output_dir: default_output_dir(),
            columns: ColumnConfig::default(),
            skip_policy: SkipPolicy::default(),
            progress: ProgressConfig::default(),
        }
    }
}

impl Config {
    /// Load a configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Map a signed item limit to [`Config::max_items`]; negative means unlimited
    pub fn max_items_from_signed(limit: i64) -> Option<usize> {
        usize::try_from(limit).ok()
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_concurrent_fetches == 0 {
            return Err(Error::config(
                "max_concurrent_fetches",
                "must be at least 1",
            ));
        }
        if self.fetch.max_concurrent_checks == Some(0) {
            return Err(Error::config(
                "max_concurrent_checks",
                "must be at least 1 when set",
            ));
        }
        if self.progress.refresh_interval.is_zero() {
            return Err(Error::config("refresh_interval", "must be non-zero"));
        }
        let columns = &self.columns;
        let report_headers = [
            &columns.report_name,
            &columns.report_fallback,
            &columns.report_downloaded,
            &columns.report_error,
        ];
        for (i, header) in report_headers.iter().enumerate() {
            if header.is_empty() {
                return Err(Error::config("columns", "report headers must not be empty"));
            }
            if report_headers[..i].contains(header) {
                return Err(Error::config(
                    "columns",
                    format!("report header {header:?} is used twice"),
                ));
            }
        }
        Ok(())
    }
}

fn default_max_concurrent_fetches() -> usize {
    50
}

fn default_user_agent() -> String {
    format!("pdf-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_name_column() -> String {
    "BRnum".into()
}

fn default_primary_column() -> String {
    "Pdf_URL".into()
}

fn default_fallback_column() -> String {
    "Database link".into()
}

fn default_used_fallback_column() -> String {
    "Fallback".into()
}

fn default_downloaded_column() -> String {
    "Downloaded".into()
}

fn default_error_column() -> String {
    "Error".into()
}

fn default_output_dir() -> Option<PathBuf> {
    Some(PathBuf::from("Downloads"))
}

fn default_refresh_interval() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_recent_errors() -> usize {
    10
}

// Duration serialization helper
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
mod optional_duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => {
                serializer.serialize_some(&u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
