//! Staged analysis of one stored file.

use cloudprint_core::constants::{HASH_CHUNK_SIZE, SMALL_FILE_THRESHOLD_BYTES};
use cloudprint_core::{Config, FileRecord, FileRecordId, FileStatus};
use cloudprint_db::FileRecordRepository;
use cloudprint_processing::{
    hash_bytes, hash_stream, FileFormat, LenientPageCounter, PageCountStrategy, PageSource,
    PreviewNormalizer,
};
use cloudprint_storage::Storage;
use cloudprint_worker::{JobHandle, JobKey, SubmitError, WorkerPool};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::StageError;
use crate::writer::RecordWriter;

/// Output of an analysis job: the record as left by its terminal write.
pub type AnalysisResult = Result<FileRecord, StageError>;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Files strictly smaller than this take the single-step path.
    pub small_file_threshold: u64,
    pub stage_timeout: Duration,
    pub preview_enabled: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            small_file_threshold: SMALL_FILE_THRESHOLD_BYTES,
            stage_timeout: Duration::from_secs(120),
            preview_enabled: true,
        }
    }
}

impl From<&Config> for PipelineSettings {
    fn from(config: &Config) -> Self {
        Self {
            small_file_threshold: config.small_file_threshold_bytes(),
            stage_timeout: config.stage_timeout(),
            preview_enabled: config.preview_enabled(),
        }
    }
}

pub(crate) struct Inner {
    pub(crate) writer: RecordWriter,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) counter: Arc<dyn PageCountStrategy>,
    pub(crate) normalizer: PreviewNormalizer,
    pub(crate) pool: WorkerPool,
    pub(crate) settings: PipelineSettings,
}

/// Schedules and runs analysis and preview jobs. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    pub(crate) inner: Arc<Inner>,
}

impl Pipeline {
    /// Pipeline with the lenient page-counting strategy.
    pub fn new(
        repository: Arc<dyn FileRecordRepository>,
        storage: Arc<dyn Storage>,
        pool: WorkerPool,
        settings: PipelineSettings,
    ) -> Self {
        Self::with_strategy(
            repository,
            storage,
            pool,
            settings,
            Arc::new(LenientPageCounter),
        )
    }

    pub fn with_strategy(
        repository: Arc<dyn FileRecordRepository>,
        storage: Arc<dyn Storage>,
        pool: WorkerPool,
        settings: PipelineSettings,
        counter: Arc<dyn PageCountStrategy>,
    ) -> Self {
        tracing::info!(
            strategy = counter.name(),
            threshold_bytes = settings.small_file_threshold,
            stage_timeout_secs = settings.stage_timeout.as_secs(),
            preview_enabled = settings.preview_enabled,
            "Pipeline configured"
        );
        Pipeline {
            inner: Arc::new(Inner {
                writer: RecordWriter::new(repository),
                storage,
                counter,
                normalizer: PreviewNormalizer::new(),
                pool,
                settings,
            }),
        }
    }

    pub fn writer(&self) -> &RecordWriter {
        &self.inner.writer
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    /// Queue the analysis job for `id`. The record must be in `CREATED`.
    pub fn submit(&self, id: FileRecordId) -> Result<JobHandle<AnalysisResult>, SubmitError> {
        let pipeline = self.clone();
        self.inner
            .pool
            .submit(JobKey::analysis(id), async move { pipeline.run(id).await })
    }

    /// Move `id` to `FAILED` outside of a running job, e.g. when it could not be
    /// scheduled.
    pub async fn fail(&self, id: FileRecordId, message: &str) -> Result<FileRecord, StageError> {
        self.inner
            .writer
            .mutate(id, |r, now| r.mark_failed(message, now))
            .await
    }

    /// Run the analysis stages for `id` to a terminal status.
    ///
    /// Stage failures are recorded on the record and returned as `Ok`; `Err` means
    /// the terminal state itself could not be written.
    #[tracing::instrument(skip(self), fields(file_id = %id))]
    pub async fn run(&self, id: FileRecordId) -> AnalysisResult {
        let started = Instant::now();
        let record = self.inner.writer.load(id).await?;

        match self.process(&record).await {
            Ok(done) => {
                tracing::info!(
                    file_id = %id,
                    page_count = done.page_count,
                    size_bytes = done.byte_size,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "File analysis complete"
                );
                Ok(done)
            }
            Err(e) => {
                let message = e.to_string();
                tracing::warn!(
                    file_id = %id,
                    error = %message,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "File analysis failed"
                );
                self.fail(id, &message).await
            }
        }
    }

    async fn process(&self, record: &FileRecord) -> Result<FileRecord, StageError> {
        if record.status != FileStatus::Created {
            return Err(cloudprint_core::TransitionError {
                id: record.id,
                from: record.status,
                to: FileStatus::Analyzing,
            }
            .into());
        }

        let format = FileFormat::from_filename(&record.original_name);
        let size = record.byte_size.max(0) as u64;
        if size < self.inner.settings.small_file_threshold {
            self.process_small(record, format).await
        } else {
            self.process_staged(record, format, size).await
        }
    }

    /// Single step: one read, digest and page count together.
    async fn process_small(
        &self,
        record: &FileRecord,
        format: FileFormat,
    ) -> Result<FileRecord, StageError> {
        let writer = &self.inner.writer;
        writer
            .mutate(record.id, |r, now| r.mark_analyzing(None, now))
            .await?;

        let (digest, pages) = self
            .stage("analyzing", async {
                let bytes = self.inner.storage.download(&record.stored_path).await?;
                let counter = self.inner.counter.clone();
                let counted = tokio::task::spawn_blocking(move || {
                    let digest = hash_bytes(&bytes);
                    counter
                        .count(format, PageSource::Bytes(&bytes))
                        .map(|pages| (digest, pages))
                })
                .await??;
                Ok::<_, StageError>(counted)
            })
            .await?;

        writer
            .mutate(record.id, |r, now| {
                r.mark_done(Some(digest), pages as i32, now)
            })
            .await
    }

    /// Streamed digest in `HASHING`, then counting in `ANALYZING`.
    async fn process_staged(
        &self,
        record: &FileRecord,
        format: FileFormat,
        size: u64,
    ) -> Result<FileRecord, StageError> {
        let writer = &self.inner.writer;
        writer.mutate(record.id, |r, now| r.mark_hashing(now)).await?;

        let digest = self
            .stage("hashing", async {
                let stream = self
                    .inner
                    .storage
                    .download_stream(&record.stored_path, HASH_CHUNK_SIZE)
                    .await?;
                Ok::<_, StageError>(hash_stream(stream).await?)
            })
            .await?;

        writer
            .mutate(record.id, |r, now| r.mark_analyzing(Some(digest), now))
            .await?;

        let pages = self
            .stage("analyzing", async {
                let counter = self.inner.counter.clone();
                if !format.needs_content() {
                    return Ok(counter.count(format, PageSource::SizeOnly(size))?);
                }
                let bytes = self.inner.storage.download(&record.stored_path).await?;
                let pages = tokio::task::spawn_blocking(move || {
                    counter.count(format, PageSource::Bytes(&bytes))
                })
                .await??;
                Ok::<_, StageError>(pages)
            })
            .await?;

        writer
            .mutate(record.id, |r, now| r.mark_done(None, pages as i32, now))
            .await
    }

    /// Bound a stage by the configured timeout.
    pub(crate) async fn stage<T, F>(&self, stage: &'static str, work: F) -> Result<T, StageError>
    where
        F: Future<Output = Result<T, StageError>>,
    {
        let after = self.inner.settings.stage_timeout;
        match tokio::time::timeout(after, work).await {
            Ok(result) => result,
            Err(_) => Err(StageError::Timeout { stage, after }),
        }
    }

    /// Restart every record left mid-pipeline, e.g. by a crash.
    ///
    /// Each record is reset to `CREATED` and resubmitted as a fresh attempt. Records
    /// that cannot be scheduled stay in `CREATED` for the next recovery run.
    #[tracing::instrument(skip(self))]
    pub async fn resume_incomplete(&self) -> Result<Vec<JobHandle<AnalysisResult>>, StageError> {
        let stranded = self
            .inner
            .writer
            .repository()
            .list_by_status(&[FileStatus::Created, FileStatus::Hashing, FileStatus::Analyzing])
            .await?;

        let mut handles = Vec::with_capacity(stranded.len());
        for record in stranded {
            let id = record.id;
            if self.inner.pool.is_in_flight(&JobKey::analysis(id)) {
                continue;
            }
            self.inner
                .writer
                .mutate(id, |r, now| {
                    r.reset_for_reprocessing(now);
                    Ok(())
                })
                .await?;

            match self.submit(id) {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::warn!(file_id = %id, error = %e, "Could not resubmit file");
                    continue;
                }
            }
            if self.inner.settings.preview_enabled && record.preview_path.is_none() {
                if let Err(e) = self.submit_preview(id) {
                    tracing::warn!(file_id = %id, error = %e, "Could not resubmit preview");
                }
            }
        }

        tracing::info!(resumed = handles.len(), "Resumed incomplete files");
        Ok(handles)
    }
}
