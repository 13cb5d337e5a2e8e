use anyhow::Context;
use cloudprint_core::{AppError, Config, ErrorMetadata, LogLevel};
use cloudprint_db::{connect, FileRecordRepository, InMemoryFileRecordRepository, PgFileRecordRepository};
use cloudprint_pipeline::{IngestService, Pipeline, PipelineSettings};
use cloudprint_processing::{LenientPageCounter, PageCountStrategy, StrictPageCounter};
use cloudprint_storage::LocalStorage;
use cloudprint_worker::{WorkerPool, WorkerPoolConfig};
use std::sync::Arc;

/// Initialize tracing for the CLI. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cloudprint=info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

pub fn strategy(strict: bool) -> Arc<dyn PageCountStrategy> {
    if strict {
        Arc::new(StrictPageCounter)
    } else {
        Arc::new(LenientPageCounter)
    }
}

/// Declared content type for a local file when none was given.
pub fn guess_content_type(name: &str) -> &'static str {
    let ext = std::path::Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        Some("xls") => "application/vnd.ms-excel",
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("ppt") => "application/vnd.ms-powerpoint",
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Log a facade error at its level and build the text shown to the user.
///
/// Details are only shown for errors that are not marked sensitive.
pub fn report_error(e: &AppError) -> String {
    match e.log_level() {
        LogLevel::Debug => tracing::debug!(code = e.error_code(), error = %e, "Request rejected"),
        LogLevel::Warn => tracing::warn!(code = e.error_code(), error = %e, "Request rejected"),
        LogLevel::Error => tracing::error!(code = e.error_code(), error = %e, "Request failed"),
    }

    let mut text = format!("{} ({})", e.client_message(), e.error_code());
    if !e.is_sensitive() {
        text.push_str(&format!("\n  detail: {}", e));
    }
    if let Some(action) = e.suggested_action() {
        text.push_str(&format!("\n  hint: {}", action));
    }
    text
}

/// Store, pool and service wired from configuration.
pub struct Runtime {
    pub service: IngestService,
    pub pipeline: Pipeline,
    pub storage: Arc<LocalStorage>,
}

/// Build the pipeline. Uses Postgres when `DATABASE_URL` is set and the in-memory
/// store otherwise.
pub async fn build_runtime(config: &Config, strict: bool) -> anyhow::Result<Runtime> {
    tracing::info!(environment = config.environment(), "Starting cloudprint");

    let repository: Arc<dyn FileRecordRepository> = match config.database_url() {
        Some(url) => {
            let pool = connect(url, config.db_max_connections(), config.db_timeout())
                .await
                .context("Failed to connect to the record store")?;
            Arc::new(PgFileRecordRepository::new(pool))
        }
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory record store");
            Arc::new(InMemoryFileRecordRepository::new())
        }
    };

    let storage = Arc::new(
        LocalStorage::new(
            config.local_storage_path(),
            config.local_storage_base_url().to_string(),
        )
        .await
        .context("Failed to initialize local storage")?,
    );

    let pool = WorkerPool::new(WorkerPoolConfig {
        core_workers: config.worker_core_size(),
        max_workers: config.worker_max_size(),
        queue_capacity: config.worker_queue_capacity(),
    });
    let pipeline = Pipeline::with_strategy(
        repository.clone(),
        storage.clone(),
        pool,
        PipelineSettings::from(config),
        strategy(strict),
    );
    let service = IngestService::from_config(config, repository, storage.clone(), pipeline.clone());

    Ok(Runtime {
        service,
        pipeline,
        storage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_from_extension() {
        assert_eq!(guess_content_type("a.PDF"), "application/pdf");
        assert_eq!(guess_content_type("photo.jpeg"), "image/jpeg");
        assert_eq!(guess_content_type("notes"), "application/octet-stream");
    }

    #[test]
    fn strategy_names() {
        assert_eq!(strategy(true).name(), "strict");
        assert_eq!(strategy(false).name(), "lenient");
    }

    #[test]
    fn report_shows_detail_only_when_not_sensitive() {
        let full = report_error(&AppError::QueueFull("Worker queue is full (capacity 100)".into()));
        assert!(full.starts_with("The processing queue is full (QUEUE_FULL)"));
        assert!(full.contains("capacity 100"));
        assert!(full.contains("hint: Wait a few seconds and retry"));

        let storage = report_error(&AppError::Storage("/srv/files/uploads/1/a.pdf: denied".into()));
        assert!(storage.starts_with("Failed to access file storage (STORAGE_ERROR)"));
        assert!(!storage.contains("/srv/files"));
    }

    #[tokio::test]
    async fn runtime_without_database_uses_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config(Box::new(cloudprint_core::PipelineConfig {
            database_url: None,
            local_storage_path: dir.path().to_string_lossy().into_owned(),
            ..Default::default()
        }));

        let runtime = build_runtime(&config, false).await.unwrap();
        let receipt = runtime
            .service
            .ingest_tracked(b"plain notes".to_vec(), "notes.txt", "text/plain", 3)
            .await
            .unwrap();
        receipt.analysis.wait().await.unwrap().unwrap();
        if let Some(preview) = receipt.preview {
            preview.wait().await.unwrap().unwrap();
        }

        let record = runtime.service.get_status(receipt.id).await.unwrap();
        assert_eq!(record.status, cloudprint_core::FileStatus::Done);
        assert_eq!(record.page_count, 1);
        assert!(record.preview_path.is_some());

        runtime.pipeline.pool().shutdown().await;
    }
}
