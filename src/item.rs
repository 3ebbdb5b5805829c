//! Per-document work item and its status state machine.
//!
//! All mutable fields of an [`Item`] live behind one mutex, so every transition
//! and every [`Item::snapshot`] is atomic with respect to the others. Status,
//! timestamps and size are mirrored into atomics after each write, which lets a
//! renderer poll them without taking the lock. Anything that needs more than one
//! field coherently must go through `snapshot`.

use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::types::{ItemSnapshot, Status};

#[derive(Debug)]
struct ItemState {
    status: Status,
    payload: Option<Arc<[u8]>>,
    start_millis: u64,
    stop_millis: u64,
    size: usize,
    error: Option<String>,
}

/// One document to acquire
///
/// Name and sources are immutable. Status changes only along the edges of
/// [`Status::can_transition_to`]; an illegal edge is rejected with
/// [`Error::InvalidTransition`] and leaves the item untouched.
#[derive(Debug)]
pub struct Item {
    name: String,
    primary_source: String,
    fallback_source: Option<String>,
    is_fallback: bool,
    fallback_spawned: AtomicBool,
    state: Mutex<ItemState>,
    // Lock-free mirrors, written only while `state` is held
    status: AtomicU8,
    start_millis: AtomicU64,
    stop_millis: AtomicU64,
    size: AtomicUsize,
}

impl Item {
    /// Create a waiting item
    pub fn new(
        name: impl Into<String>,
        primary_source: impl Into<String>,
        fallback_source: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            primary_source: primary_source.into(),
            fallback_source,
            is_fallback: false,
            fallback_spawned: AtomicBool::new(false),
            state: Mutex::new(ItemState {
                status: Status::Waiting,
                payload: None,
                start_millis: 0,
                stop_millis: 0,
                size: 0,
                error: None,
            }),
            status: AtomicU8::new(Status::Waiting as u8),
            start_millis: AtomicU64::new(0),
            stop_millis: AtomicU64::new(0),
            size: AtomicUsize::new(0),
        }
    }

    /// Item name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source fetched for this item
    pub fn primary_source(&self) -> &str {
        &self.primary_source
    }

    /// Source used by the fallback item, absent when this item is itself a fallback
    pub fn fallback_source(&self) -> Option<&str> {
        self.fallback_source.as_deref()
    }

    /// Whether this item carries a fallback source
    pub fn has_fallback(&self) -> bool {
        self.fallback_source.is_some()
    }

    /// Whether this item was spawned as the fallback of another
    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    /// Current status (lock-free)
    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Fetch start in run-clock milliseconds (lock-free)
    pub fn start_millis(&self) -> u64 {
        self.start_millis.load(Ordering::Acquire)
    }

    /// Fetch stop in run-clock milliseconds (lock-free)
    pub fn stop_millis(&self) -> u64 {
        self.stop_millis.load(Ordering::Acquire)
    }

    /// Byte length of the last payload received (lock-free)
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Last failure description
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Shared handle to the payload, if one is currently held
    pub fn payload(&self) -> Option<Arc<[u8]>> {
        self.lock().payload.clone()
    }

    /// Read every field under one lock
    pub fn snapshot(&self) -> ItemSnapshot {
        let state = self.lock();
        ItemSnapshot {
            name: self.name.clone(),
            start_millis: state.start_millis,
            stop_millis: state.stop_millis,
            status: state.status,
            size: state.size,
            payload_len: state.payload.as_ref().map_or(0, |p| p.len()),
            error: state.error.clone(),
            has_fallback: self.fallback_source.is_some(),
            is_fallback: self.is_fallback,
        }
    }

    /// `Waiting -> Downloading`, recording the start time
    pub fn begin_download(&self, now_millis: u64) -> Result<()> {
        self.transition(Status::Downloading, |state| {
            state.start_millis = now_millis;
        })
    }

    /// `Downloading -> Checking`, storing the payload and recording the stop time
    pub fn finish_download(&self, payload: Vec<u8>, now_millis: u64) -> Result<()> {
        self.transition(Status::Checking, |state| {
            state.size = payload.len();
            state.payload = Some(Arc::from(payload));
            state.stop_millis = now_millis;
        })
    }

    /// `Downloading -> DownloadFailed`, recording the error and stop time
    pub fn fail_download(&self, error: impl Into<String>, now_millis: u64) -> Result<()> {
        let error = error.into();
        self.transition(Status::DownloadFailed, |state| {
            state.error = Some(error);
            state.stop_millis = now_millis;
        })
    }

    /// Re-assert `Checking` when the check stage takes custody
    pub fn begin_check(&self) -> Result<()> {
        self.transition(Status::Checking, |_| {})
    }

    /// `Checking -> Done`
    pub fn complete(&self) -> Result<()> {
        self.transition(Status::Done, |_| {})
    }

    /// `Checking -> CheckingFailed`, recording the error
    pub fn fail_check(&self, error: impl Into<String>) -> Result<()> {
        let error = error.into();
        self.transition(Status::CheckingFailed, |state| {
            state.error = Some(error);
        })
    }

    /// Spawn the fallback item, at most once and only if a fallback source exists
    ///
    /// The returned item fetches the fallback source and has no fallback of its own.
    pub fn spawn_fallback(&self) -> Option<Item> {
        let source = self.fallback_source.as_ref()?;
        if self.fallback_spawned.swap(true, Ordering::AcqRel) {
            return None;
        }
        let mut fallback = Item::new(self.name.clone(), source.clone(), None);
        fallback.is_fallback = true;
        Some(fallback)
    }

    /// Report ordering: by name, an original before its fallback
    pub fn report_order(&self, other: &Item) -> CmpOrdering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.is_fallback.cmp(&other.is_fallback))
    }

    fn transition(&self, to: Status, update: impl FnOnce(&mut ItemState)) -> Result<()> {
        let mut state = self.lock();
        if !state.status.can_transition_to(to) {
            return Err(Error::InvalidTransition {
                name: self.name.clone(),
                from: state.status,
                to,
            });
        }
        update(&mut state);
        state.status = to;
        if to.clears_payload() {
            state.payload = None;
        }
        self.publish(&state);
        Ok(())
    }

    fn publish(&self, state: &ItemState) {
        self.start_millis.store(state.start_millis, Ordering::Release);
        self.stop_millis.store(state.stop_millis, Ordering::Release);
        self.size.store(state.size, Ordering::Release);
        self.status.store(state.status as u8, Ordering::Release);
    }

    // Every transition leaves the state coherent, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, ItemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
