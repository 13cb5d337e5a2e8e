//! Preview job.
//!
//! Runs on the same pool as analysis under its own key. Whatever happens, the job
//! leaves the record's status and error untouched.

use cloudprint_core::{FileRecord, FileRecordId};
use cloudprint_processing::{FileFormat, PreviewOutcome};
use cloudprint_storage::generate_preview_key;
use cloudprint_worker::{JobHandle, JobKey, SubmitError};

use crate::error::StageError;
use crate::pipeline::Pipeline;

const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Output of a preview job: the record after the preview fields were written.
pub type PreviewResult = Result<FileRecord, StageError>;

impl Pipeline {
    pub fn submit_preview(&self, id: FileRecordId) -> Result<JobHandle<PreviewResult>, SubmitError> {
        let pipeline = self.clone();
        self.inner
            .pool
            .submit(JobKey::preview(id), async move { pipeline.run_preview(id).await })
    }

    /// Produce and record the preview for `id`.
    #[tracing::instrument(skip(self), fields(file_id = %id))]
    pub async fn run_preview(&self, id: FileRecordId) -> PreviewResult {
        let record = self.inner.writer.load(id).await?;
        let format = FileFormat::from_filename(&record.original_name);

        if format == FileFormat::Pdf {
            let path = record.stored_path.clone();
            return self
                .inner
                .writer
                .mutate(id, |r, now| {
                    r.set_preview(path, None, now);
                    Ok(())
                })
                .await;
        }

        let (document, note) = match self.render(&record, format).await {
            Ok(PreviewOutcome::PassThrough) => (None, None),
            Ok(PreviewOutcome::Rendered(pdf)) => (Some(pdf), None),
            Ok(PreviewOutcome::Failed { pdf, reason }) => (Some(pdf), Some(reason)),
            Err(e) => {
                let reason = e.to_string();
                let pdf = self
                    .inner
                    .normalizer
                    .error_document(&record.original_name, &reason)
                    .ok();
                (pdf, Some(reason))
            }
        };

        let stored = match document {
            Some(pdf) => {
                let key = generate_preview_key(record.owner_id, id.as_i64());
                match self
                    .inner
                    .storage
                    .upload_with_key(&key, pdf, PDF_CONTENT_TYPE)
                    .await
                {
                    Ok(_) => Ok(key),
                    Err(e) => Err(e.to_string()),
                }
            }
            None => Ok(record.stored_path.clone()),
        };

        match stored {
            Ok(path) => {
                if let Some(reason) = &note {
                    tracing::warn!(file_id = %id, reason = %reason, "Preview fell back to error page");
                } else {
                    tracing::debug!(file_id = %id, preview_path = %path, "Preview stored");
                }
                self.inner
                    .writer
                    .mutate(id, |r, now| {
                        r.set_preview(path, note, now);
                        Ok(())
                    })
                    .await
            }
            Err(upload_error) => {
                let message = match note {
                    Some(reason) => format!("{}; preview upload failed: {}", reason, upload_error),
                    None => format!("Preview upload failed: {}", upload_error),
                };
                tracing::warn!(file_id = %id, error = %message, "Preview could not be stored");
                // The stored original stands in so the preview path is never left empty.
                let fallback = record.stored_path.clone();
                self.inner
                    .writer
                    .mutate(id, |r, now| {
                        r.set_preview(fallback, Some(message), now);
                        Ok(())
                    })
                    .await
            }
        }
    }

    async fn render(
        &self,
        record: &FileRecord,
        format: FileFormat,
    ) -> Result<PreviewOutcome, StageError> {
        self.stage("preview", async {
            let bytes = self.inner.storage.download(&record.stored_path).await?;
            let normalizer = self.inner.normalizer;
            let name = record.original_name.clone();
            let outcome =
                tokio::task::spawn_blocking(move || normalizer.normalize(format, &bytes, &name))
                    .await??;
            Ok::<_, StageError>(outcome)
        })
        .await
    }
}
