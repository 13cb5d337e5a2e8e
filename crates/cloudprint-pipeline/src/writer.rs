//! Serialized record updates.
//!
//! The analysis and preview jobs for one file run concurrently and both rewrite the
//! full record. Every update therefore re-reads the record under a per-id lock,
//! applies the change and upserts it, so neither job overwrites the other's fields.

use chrono::{DateTime, Utc};
use cloudprint_core::{FileRecord, FileRecordId, TransitionError};
use cloudprint_db::FileRecordRepository;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::StageError;

#[derive(Clone)]
pub struct RecordWriter {
    repository: Arc<dyn FileRecordRepository>,
    locks: Arc<DashMap<FileRecordId, Arc<Mutex<()>>>>,
}

impl RecordWriter {
    pub fn new(repository: Arc<dyn FileRecordRepository>) -> Self {
        RecordWriter {
            repository,
            locks: Arc::new(DashMap::new()),
        }
    }

    pub fn repository(&self) -> &Arc<dyn FileRecordRepository> {
        &self.repository
    }

    pub async fn load(&self, id: FileRecordId) -> Result<FileRecord, StageError> {
        self.repository
            .get(id)
            .await?
            .ok_or(StageError::NotFound(id))
    }

    /// Apply `change` to the current stored record and persist the result.
    ///
    /// Nothing is written when `change` fails.
    pub async fn mutate<F>(&self, id: FileRecordId, change: F) -> Result<FileRecord, StageError>
    where
        F: FnOnce(&mut FileRecord, DateTime<Utc>) -> Result<(), TransitionError>,
    {
        let lock = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.apply(id, change).await
        };

        drop(lock);
        self.locks.remove_if(&id, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn apply<F>(&self, id: FileRecordId, change: F) -> Result<FileRecord, StageError>
    where
        F: FnOnce(&mut FileRecord, DateTime<Utc>) -> Result<(), TransitionError>,
    {
        let mut record = self.load(id).await?;
        let from = record.status;
        change(&mut record, Utc::now())?;
        self.repository.upsert(&record).await?;
        if from != record.status {
            tracing::debug!(
                file_id = %id,
                from = %from,
                status = %record.status,
                "File record transitioned"
            );
        }
        Ok(record)
    }
}
