//! Core types for pdf-dl

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Lifecycle status of a single item
///
/// `Waiting -> Downloading -> Checking -> {Done | CheckingFailed}` and
/// `Downloading -> DownloadFailed`. The last three are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Status {
    /// Created, not yet admitted to the fetch stage
    Waiting = 0,
    /// Holding an admission slot, fetch in flight
    Downloading = 1,
    /// Payload received, validation or persisting in progress
    Checking = 2,
    /// Validated and persisted
    Done = 3,
    /// The fetch failed
    DownloadFailed = 4,
    /// Validation or persisting failed
    CheckingFailed = 5,
}

impl Status {
    /// All statuses in lifecycle order
    pub const ALL: [Status; 6] = [
        Status::Waiting,
        Status::Downloading,
        Status::Checking,
        Status::Done,
        Status::DownloadFailed,
        Status::CheckingFailed,
    ];

    /// Decode the atomic representation; unknown values map to `CheckingFailed`
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Status::Waiting,
            1 => Status::Downloading,
            2 => Status::Checking,
            3 => Status::Done,
            4 => Status::DownloadFailed,
            _ => Status::CheckingFailed,
        }
    }

    /// Whether no further transition can happen
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Status::Done | Status::DownloadFailed | Status::CheckingFailed
        )
    }

    /// Whether this is one of the two failure states
    pub fn is_failure(self) -> bool {
        matches!(self, Status::DownloadFailed | Status::CheckingFailed)
    }

    /// Whether entering this status drops the payload
    pub fn clears_payload(self) -> bool {
        matches!(
            self,
            Status::Waiting | Status::Done | Status::DownloadFailed | Status::CheckingFailed
        )
    }

    /// Whether `self -> next` is an edge of the state machine
    ///
    /// `Checking -> Checking` is allowed: the check stage re-asserts the status
    /// when it takes custody of an item.
    pub fn can_transition_to(self, next: Status) -> bool {
        matches!(
            (self, next),
            (Status::Waiting, Status::Downloading)
                | (Status::Downloading, Status::Checking)
                | (Status::Downloading, Status::DownloadFailed)
                | (Status::Checking, Status::Checking)
                | (Status::Checking, Status::Done)
                | (Status::Checking, Status::CheckingFailed)
        )
    }

    /// Short human label used by renderers
    pub fn label(self) -> &'static str {
        match self {
            Status::Waiting => "Waiting",
            Status::Downloading => "Downloading",
            Status::Checking => "Checking and saving",
            Status::Done => "Saved",
            Status::DownloadFailed => "Failed during download",
            Status::CheckingFailed => "Failed to check or save",
        }
    }
}

/// Coherent copy of every field of an [`Item`](crate::item::Item)
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemSnapshot {
    /// Item name
    pub name: String,
    /// Fetch start, milliseconds on the run clock (0 = not started)
    pub start_millis: u64,
    /// Fetch stop, milliseconds on the run clock (0 = not stopped)
    pub stop_millis: u64,
    /// Current status
    pub status: Status,
    /// Length of the last payload received (kept after the payload is dropped)
    pub size: usize,
    /// Length of the payload currently held (0 outside `Downloading`/`Checking`)
    pub payload_len: usize,
    /// Last failure description
    pub error: Option<String>,
    /// Whether this item carries a fallback source
    pub has_fallback: bool,
    /// Whether this item is the fallback attempt of another
    pub is_fallback: bool,
}

/// One input row: a name with its primary and optional fallback source
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputRow {
    /// Item name
    pub name: String,
    /// Primary source
    pub primary: String,
    /// Fallback source, `None` when blank
    pub fallback: Option<String>,
}

impl InputRow {
    /// Create a row, treating a blank fallback as absent
    pub fn new(
        name: impl Into<String>,
        primary: impl Into<String>,
        fallback: Option<impl Into<String>>,
    ) -> Self {
        let fallback: Option<String> = fallback.map(Into::into);
        let fallback = fallback.filter(|f| !f.trim().is_empty());
        Self {
            name: name.into(),
            primary: primary.into(),
            fallback,
        }
    }
}

/// One row of the final report
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    /// Item name
    pub name: String,
    /// Whether this row is the fallback attempt
    pub used_fallback: bool,
    /// Whether the item ended `Done`
    pub downloaded: bool,
    /// Failure text, empty when none
    pub error: String,
}

/// Monotonic run clock shared between the pipeline and the progress sink
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    start: Instant,
}

impl Clock {
    /// Start a clock now
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Time since the clock started
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Milliseconds since the clock started
    pub fn elapsed_millis(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}

/// Aggregate outcome of a run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Items admitted from the input table
    pub admitted: usize,
    /// Fallback items spawned
    pub fallbacks: usize,
    /// Items that ended `Done`
    pub done: usize,
    /// Items that ended `DownloadFailed`
    pub download_failed: usize,
    /// Items that ended `CheckingFailed`
    pub checking_failed: usize,
    /// Wall time of the run in milliseconds
    pub elapsed_millis: u64,
}
