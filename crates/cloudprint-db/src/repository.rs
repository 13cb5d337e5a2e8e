use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudprint_core::{FileRecord, FileRecordId, FileStatus, NewFileRecord};

#[async_trait]
pub trait FileRecordRepository: Send + Sync {
    /// Persist a new `CREATED` record and return it with its assigned id.
    async fn create(&self, new: NewFileRecord, now: DateTime<Utc>) -> Result<FileRecord>;

    async fn get(&self, id: FileRecordId) -> Result<Option<FileRecord>>;

    /// Write every field of `record`, inserting it if the id is unknown.
    async fn upsert(&self, record: &FileRecord) -> Result<()>;

    /// Records currently in any of `statuses`, oldest first.
    async fn list_by_status(&self, statuses: &[FileStatus]) -> Result<Vec<FileRecord>>;
}
