use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudprint_core::{FileRecord, FileRecordId, FileStatus, NewFileRecord};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::repository::FileRecordRepository;

/// Process-local record store.
#[derive(Clone, Default)]
pub struct InMemoryFileRecordRepository {
    records: Arc<RwLock<HashMap<FileRecordId, FileRecord>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryFileRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl FileRecordRepository for InMemoryFileRecordRepository {
    async fn create(&self, new: NewFileRecord, now: DateTime<Utc>) -> Result<FileRecord> {
        let id = FileRecordId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let record = FileRecord::create(id, new, now);
        self.records.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: FileRecordId) -> Result<Option<FileRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn upsert(&self, record: &FileRecord) -> Result<()> {
        let mut records = self.records.write().await;
        // Keep generated ids ahead of explicitly inserted ones.
        self.next_id.fetch_max(record.id.as_i64(), Ordering::SeqCst);
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn list_by_status(&self, statuses: &[FileStatus]) -> Result<Vec<FileRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<FileRecord> = records
            .values()
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.created_at, r.id));
        Ok(matching)
    }
}
