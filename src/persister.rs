//! Durable storage for validated documents.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

use crate::error::CheckError;

/// Where a validated document is written
#[async_trait]
pub trait Persister: Send + Sync {
    /// Store `bytes` under the item `name`, returning the location written (if any)
    async fn persist(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> std::result::Result<Option<PathBuf>, CheckError>;
}

/// Target path for a document: `<dir>/<name>.pdf`
///
/// `.pdf` is appended to the whole name, so dots inside a name are kept.
///
/// # Errors
/// [`CheckError::InvalidName`] if `name` is not a single plain file name
/// inside `dir`
pub fn document_path(dir: &Path, name: &str) -> std::result::Result<PathBuf, CheckError> {
    match unusable_name(name) {
        Some(reason) => Err(CheckError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(dir.join(format!("{name}.pdf"))),
    }
}

fn unusable_name(name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        return Some("empty name");
    }
    if name.contains(['/', '\\']) {
        return Some("contains a path separator");
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => None,
        (Some(Component::CurDir | Component::ParentDir), _) => Some("refers to a directory"),
        _ => Some("not a plain file name"),
    }
}

/// Writes documents into a directory
#[derive(Clone, Debug)]
pub struct FsPersister {
    dir: PathBuf,
}

impl FsPersister {
    /// Persist into `dir`; the directory must already exist
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Persister for FsPersister {
    async fn persist(
        &self,
        name: &str,
        bytes: &[u8],
    ) -> std::result::Result<Option<PathBuf>, CheckError> {
        let path = document_path(&self.dir, name)?;
        match tokio::fs::write(&path, bytes).await {
            Ok(()) => Ok(Some(path)),
            Err(source) => Err(CheckError::Persist { path, source }),
        }
    }
}

/// No-op persister used when no output directory is configured
///
/// Documents are validated but never written.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpPersister;

#[async_trait]
impl Persister for NoOpPersister {
    async fn persist(
        &self,
        _name: &str,
        _bytes: &[u8],
    ) -> std::result::Result<Option<PathBuf>, CheckError> {
        Ok(None)
    }
}
