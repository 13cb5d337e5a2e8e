use cloudprint_core::FileRecordId;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Analysis,
    Preview,
}

impl Display for JobKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobKind::Analysis => write!(f, "analysis"),
            JobKind::Preview => write!(f, "preview"),
        }
    }
}

/// Single-flight key. Two jobs with equal keys never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey {
    pub kind: JobKind,
    pub file_id: FileRecordId,
}

impl JobKey {
    pub fn analysis(file_id: FileRecordId) -> Self {
        JobKey {
            kind: JobKind::Analysis,
            file_id,
        }
    }

    pub fn preview(file_id: FileRecordId) -> Self {
        JobKey {
            kind: JobKind::Preview,
            file_id,
        }
    }
}

impl Display for JobKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.kind, self.file_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("Worker queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Job {0} is already queued or running")]
    AlreadyInFlight(JobKey),

    #[error("Worker pool is shutting down")]
    ShuttingDown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Job was dropped before it completed")]
    Dropped,
}

/// Completion handle returned by [`crate::WorkerPool::submit`].
///
/// Dropping the handle does not cancel the job.
#[derive(Debug)]
pub struct JobHandle<T> {
    key: JobKey,
    rx: oneshot::Receiver<Result<T, JobError>>,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(key: JobKey, rx: oneshot::Receiver<Result<T, JobError>>) -> Self {
        JobHandle { key, rx }
    }

    pub fn key(&self) -> JobKey {
        self.key
    }

    /// Wait for the job's output.
    pub async fn wait(self) -> Result<T, JobError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(JobError::Dropped),
        }
    }
}
