//! Cache and directory error types

use std::error::Error;
use std::sync::Arc;

/// Classified failures surfaced by the directory store.
///
/// The coherence layer branches on the first two kinds; everything else is
/// an unclassified storage fault. Absence of a record is not an error: the
/// access traits report it as `Ok(None)`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("unique key constraint violated: {0}")]
    UniqueKey(String),

    #[error("foreign key constraint violated: {0}")]
    ForeignKey(String),

    #[error("storage fault: {0}")]
    Storage(Arc<dyn Error + Send + Sync>),
}

impl DirectoryError {
    /// Wrap an arbitrary store failure as an unclassified storage fault.
    ///
    /// The cause is shared rather than boxed so a failed load can be handed
    /// to every caller coalesced onto the same in-flight fetch.
    pub fn storage(cause: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self::Storage(Arc::from(cause.into()))
    }
}

/// Errors surfaced by the public cache operations.
///
/// Not-found conditions never appear here; they come back as sentinel
/// values (`0` for ids, `None` for names and group lists).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Loader outcome tunneled through the read-through machinery.
///
/// The public operations translate `NotFound` into their sentinel and
/// propagate `Directory` faults to the caller.
#[derive(Debug, Clone)]
pub(crate) enum LoadError {
    NotFound,
    Directory(DirectoryError),
}
