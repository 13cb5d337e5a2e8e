//! Ingestion facade.
//!
//! Only scheduling-time failures escape [`IngestService::ingest`]: invalid input, the
//! store or storage being unreachable, or the worker pool refusing the job. Anything
//! that goes wrong later is recorded on the file record.

use chrono::Utc;
use cloudprint_core::{AppError, Config, FileRecord, FileRecordId, FileStatus, NewFileRecord};
use cloudprint_db::FileRecordRepository;
use cloudprint_storage::{Storage, StorageError};
use cloudprint_worker::{JobHandle, SubmitError};
use std::sync::Arc;

use crate::error::StageError;
use crate::pipeline::{AnalysisResult, Pipeline};
use crate::preview::PreviewResult;

/// Ingested file id plus handles to await its jobs.
pub struct IngestReceipt {
    pub id: FileRecordId,
    pub analysis: JobHandle<AnalysisResult>,
    /// `None` when previews are disabled or the preview job could not be queued.
    pub preview: Option<JobHandle<PreviewResult>>,
}

#[derive(Clone)]
pub struct IngestService {
    repository: Arc<dyn FileRecordRepository>,
    storage: Arc<dyn Storage>,
    pipeline: Pipeline,
    max_upload_bytes: usize,
}

impl IngestService {
    pub fn new(
        repository: Arc<dyn FileRecordRepository>,
        storage: Arc<dyn Storage>,
        pipeline: Pipeline,
        max_upload_bytes: usize,
    ) -> Self {
        IngestService {
            repository,
            storage,
            pipeline,
            max_upload_bytes,
        }
    }

    pub fn from_config(
        config: &Config,
        repository: Arc<dyn FileRecordRepository>,
        storage: Arc<dyn Storage>,
        pipeline: Pipeline,
    ) -> Self {
        Self::new(repository, storage, pipeline, config.max_upload_size_bytes())
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Store `content`, create its record and schedule processing. Returns as soon as
    /// the jobs are queued.
    pub async fn ingest(
        &self,
        content: Vec<u8>,
        original_name: &str,
        content_type: &str,
        owner_id: i64,
    ) -> Result<FileRecordId, AppError> {
        let receipt = self
            .ingest_tracked(content, original_name, content_type, owner_id)
            .await?;
        Ok(receipt.id)
    }

    /// Like [`IngestService::ingest`] but hands back the job handles.
    #[tracing::instrument(skip(self, content), fields(size_bytes = content.len()))]
    pub async fn ingest_tracked(
        &self,
        content: Vec<u8>,
        original_name: &str,
        content_type: &str,
        owner_id: i64,
    ) -> Result<IngestReceipt, AppError> {
        self.validate(&content, original_name)?;

        let byte_size = content.len() as i64;
        let (stored_path, _url) = self
            .storage
            .upload(owner_id, original_name, content_type, content)
            .await
            .map_err(storage_error)?;

        let new = NewFileRecord {
            owner_id,
            original_name: original_name.to_string(),
            stored_path: stored_path.clone(),
            byte_size,
            content_type: content_type.to_string(),
        };
        let record = match self.repository.create(new, Utc::now()).await {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = self.storage.delete(&stored_path).await {
                    tracing::warn!(
                        stored_path = %stored_path,
                        error = %cleanup,
                        "Failed to remove orphaned upload"
                    );
                }
                return Err(e.context("Failed to create file record").into());
            }
        };
        let id = record.id;

        let analysis = match self.pipeline.submit(id) {
            Ok(handle) => handle,
            Err(e) => {
                let message = format!("Could not schedule processing: {}", e);
                if let Err(write) = self.pipeline.fail(id, &message).await {
                    tracing::error!(file_id = %id, error = %write, "Failed to record scheduling failure");
                }
                return Err(submit_error(e));
            }
        };

        let preview = if self.pipeline.settings().preview_enabled {
            match self.pipeline.submit_preview(id) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(file_id = %id, error = %e, "Preview job not scheduled");
                    let note = format!("Preview not scheduled: {}", e);
                    if let Err(write) = self
                        .pipeline
                        .writer()
                        .mutate(id, |r, now| {
                            r.note_preview_failure(note, now);
                            Ok(())
                        })
                        .await
                    {
                        tracing::error!(file_id = %id, error = %write, "Failed to record preview note");
                    }
                    None
                }
            }
        } else {
            None
        };

        tracing::info!(
            file_id = %id,
            owner_id = owner_id,
            size_bytes = byte_size,
            "File ingested"
        );

        Ok(IngestReceipt {
            id,
            analysis,
            preview,
        })
    }

    fn validate(&self, content: &[u8], original_name: &str) -> Result<(), AppError> {
        if original_name.trim().is_empty() {
            return Err(AppError::InvalidInput("File name is required".to_string()));
        }
        if content.is_empty() {
            return Err(AppError::InvalidInput("File is empty".to_string()));
        }
        if content.len() > self.max_upload_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "{} bytes exceeds the {} byte limit",
                content.len(),
                self.max_upload_bytes
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_status(&self, id: FileRecordId) -> Result<FileRecord, AppError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {}", id)))
    }

    /// Storage key of the original upload.
    pub async fn download(&self, id: FileRecordId) -> Result<String, AppError> {
        Ok(self.get_status(id).await?.stored_path)
    }

    /// Storage key of the preview document, once one exists.
    pub async fn preview(&self, id: FileRecordId) -> Result<String, AppError> {
        let record = self.get_status(id).await?;
        match record.preview_path {
            Some(path) => Ok(path),
            None => {
                let detail = match (&record.preview_note, record.status) {
                    (Some(note), _) => note.clone(),
                    (None, FileStatus::Done | FileStatus::Failed) => {
                        format!("No preview recorded for file {}", id)
                    }
                    (None, status) => format!("File {} is {}", id, status),
                };
                Err(AppError::PreviewNotReady(detail))
            }
        }
    }
}

fn storage_error(e: StorageError) -> AppError {
    AppError::Storage(e.to_string())
}

fn submit_error(e: SubmitError) -> AppError {
    match e {
        SubmitError::QueueFull { .. } => AppError::QueueFull(e.to_string()),
        SubmitError::AlreadyInFlight(_) => AppError::AlreadyProcessing(e.to_string()),
        SubmitError::ShuttingDown => AppError::Internal(e.to_string()),
    }
}

/// Map a job's stage error onto the facade error.
pub fn stage_error(e: StageError) -> AppError {
    match e {
        StageError::NotFound(id) => AppError::NotFound(format!("File {}", id)),
        StageError::Storage(inner) => storage_error(inner),
        StageError::Store(inner) => inner.into(),
        other => AppError::Internal(other.to_string()),
    }
}
