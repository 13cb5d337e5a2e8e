use cloudprint_core::{FileRecordId, TransitionError};
use cloudprint_processing::{HashError, PageCountError, PreviewError};
use cloudprint_storage::StorageError;
use std::time::Duration;

/// Why a pipeline stage stopped. The `Display` text is what lands in the record's
/// `error` field.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    PageCount(#[from] PageCountError),

    #[error(transparent)]
    Preview(#[from] PreviewError),

    #[error("{stage} stage timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    #[error("Background task failed: {0}")]
    Blocking(String),

    #[error("Record {0} not found")]
    NotFound(FileRecordId),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Record store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<tokio::task::JoinError> for StageError {
    fn from(e: tokio::task::JoinError) -> Self {
        StageError::Blocking(e.to_string())
    }
}
