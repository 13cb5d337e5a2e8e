#![allow(dead_code)]

pub mod fixtures;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudprint_core::{FileRecord, FileRecordId, FileStatus, NewFileRecord};
use cloudprint_db::{FileRecordRepository, InMemoryFileRecordRepository};
use cloudprint_pipeline::{IngestService, Pipeline, PipelineSettings};
use cloudprint_processing::PageCountStrategy;
use cloudprint_storage::{ByteStream, LocalStorage, Storage, StorageError, StorageResult};
use cloudprint_worker::{WorkerPool, WorkerPoolConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// In-memory store that remembers every status each record was written with.
#[derive(Default)]
pub struct RecordingRepository {
    inner: InMemoryFileRecordRepository,
    history: Mutex<HashMap<FileRecordId, Vec<FileStatus>>>,
}

impl RecordingRepository {
    fn remember(&self, id: FileRecordId, status: FileStatus) {
        if let Ok(mut history) = self.history.lock() {
            let seen = history.entry(id).or_default();
            if seen.last() != Some(&status) {
                seen.push(status);
            }
        }
    }

    /// Distinct consecutive statuses written for `id`.
    pub fn statuses(&self, id: FileRecordId) -> Vec<FileStatus> {
        self.history
            .lock()
            .map(|h| h.get(&id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FileRecordRepository for RecordingRepository {
    async fn create(&self, new: NewFileRecord, now: DateTime<Utc>) -> Result<FileRecord> {
        let record = self.inner.create(new, now).await?;
        self.remember(record.id, record.status);
        Ok(record)
    }

    async fn get(&self, id: FileRecordId) -> Result<Option<FileRecord>> {
        self.inner.get(id).await
    }

    async fn upsert(&self, record: &FileRecord) -> Result<()> {
        self.inner.upsert(record).await?;
        self.remember(record.id, record.status);
        Ok(())
    }

    async fn list_by_status(&self, statuses: &[FileStatus]) -> Result<Vec<FileRecord>> {
        self.inner.list_by_status(statuses).await
    }
}

/// Failures a [`FaultyStorage`] injects on top of the local backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageFaults {
    /// `download` and `download_stream` never complete.
    pub stall_downloads: bool,
    /// `upload_with_key` fails, so no preview document can be stored.
    pub fail_preview_uploads: bool,
}

/// Local storage with optional injected failures.
pub struct FaultyStorage {
    inner: LocalStorage,
    faults: StorageFaults,
    stalled: Semaphore,
}

impl FaultyStorage {
    async fn stall_if_configured(&self) {
        if self.faults.stall_downloads {
            // No permits are ever added, so this waits until the caller gives up.
            let _permit = self.stalled.acquire().await;
        }
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn upload(
        &self,
        owner_id: i64,
        original_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<(String, String)> {
        self.inner
            .upload(owner_id, original_name, content_type, data)
            .await
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.stall_if_configured().await;
        self.inner.download(storage_key).await
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        if self.faults.fail_preview_uploads {
            return Err(StorageError::UploadFailed("disk full".to_string()));
        }
        self.inner.upload_with_key(storage_key, data, content_type).await
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.inner.delete(storage_key).await
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        self.inner.exists(storage_key).await
    }

    async fn download_stream(
        &self,
        storage_key: &str,
        chunk_size: usize,
    ) -> StorageResult<ByteStream> {
        self.stall_if_configured().await;
        self.inner.download_stream(storage_key, chunk_size).await
    }
}

pub struct TestPipeline {
    pub service: IngestService,
    pub pipeline: Pipeline,
    pub repository: Arc<RecordingRepository>,
    pub storage: Arc<FaultyStorage>,
    pub _temp_dir: TempDir,
}

pub struct Setup {
    pub settings: PipelineSettings,
    pub pool: WorkerPoolConfig,
    pub strategy: Option<Arc<dyn PageCountStrategy>>,
    pub faults: StorageFaults,
}

impl Default for Setup {
    fn default() -> Self {
        Setup {
            settings: PipelineSettings::default(),
            pool: WorkerPoolConfig::default(),
            strategy: None,
            faults: StorageFaults::default(),
        }
    }
}

pub async fn setup_pipeline() -> TestPipeline {
    setup_with(Setup::default()).await
}

pub async fn setup_with(setup: Setup) -> TestPipeline {
    let temp_dir = TempDir::new().unwrap();
    let storage = Arc::new(FaultyStorage {
        inner: LocalStorage::new(temp_dir.path(), "http://localhost/files".to_string())
            .await
            .unwrap(),
        faults: setup.faults,
        stalled: Semaphore::new(0),
    });
    let repository = Arc::new(RecordingRepository::default());
    let pool = WorkerPool::new(setup.pool);

    let pipeline = match setup.strategy {
        Some(strategy) => Pipeline::with_strategy(
            repository.clone(),
            storage.clone(),
            pool,
            setup.settings,
            strategy,
        ),
        None => Pipeline::new(repository.clone(), storage.clone(), pool, setup.settings),
    };
    let service = IngestService::new(
        repository.clone(),
        storage.clone(),
        pipeline.clone(),
        MAX_UPLOAD_BYTES,
    );

    TestPipeline {
        service,
        pipeline,
        repository,
        storage,
        _temp_dir: temp_dir,
    }
}

impl TestPipeline {
    /// Ingest and wait for both jobs; returns the final record.
    pub async fn ingest_and_wait(&self, content: Vec<u8>, name: &str) -> FileRecord {
        let receipt = self
            .service
            .ingest_tracked(content, name, "application/octet-stream", 1)
            .await
            .unwrap();
        receipt.analysis.wait().await.unwrap().unwrap();
        if let Some(preview) = receipt.preview {
            preview.wait().await.unwrap().unwrap();
        }
        self.service.get_status(receipt.id).await.unwrap()
    }
}
