//! Configuration module
//!
//! Environment-driven settings for the storage backend, the record store, the
//! worker pool and the pipeline stages.

use std::env;
use std::time::Duration;

use crate::constants::SMALL_FILE_THRESHOLD_BYTES;

// Common constants
const MAX_CONNECTIONS: u32 = 10;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Settings shared by every binary.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub environment: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
}

/// Pipeline configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub base: BaseConfig,
    /// Postgres connection string. `None` selects the in-memory record store.
    pub database_url: Option<String>,
    pub local_storage_path: String,
    pub local_storage_base_url: String,
    pub max_upload_size_bytes: usize,
    pub small_file_threshold_bytes: u64,
    pub worker_core_size: usize,
    pub worker_max_size: usize,
    pub worker_queue_capacity: usize,
    pub stage_timeout_secs: u64,
    pub preview_enabled: bool,
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_UPLOAD_SIZE_MB: usize = 100;
        const WORKER_CORE_SIZE: usize = 2;
        const WORKER_MAX_SIZE: usize = 5;
        const WORKER_QUEUE_CAPACITY: usize = 100;
        const STAGE_TIMEOUT_SECS: u64 = 120;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let base = BaseConfig {
            environment,
            db_max_connections: env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| MAX_CONNECTIONS.to_string())
                .parse()
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: env::var("DB_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| CONNECTION_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(CONNECTION_TIMEOUT_SECS),
        };

        let database_url = env::var("DATABASE_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_UPLOAD_SIZE_MB);

        Ok(PipelineConfig {
            base,
            database_url,
            local_storage_path: env::var("LOCAL_STORAGE_PATH")
                .unwrap_or_else(|_| "./data/files".to_string()),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/files".to_string()),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            small_file_threshold_bytes: env::var("SMALL_FILE_THRESHOLD_BYTES")
                .unwrap_or_else(|_| SMALL_FILE_THRESHOLD_BYTES.to_string())
                .parse()
                .unwrap_or(SMALL_FILE_THRESHOLD_BYTES),
            worker_core_size: env::var("WORKER_CORE_SIZE")
                .unwrap_or_else(|_| WORKER_CORE_SIZE.to_string())
                .parse()
                .unwrap_or(WORKER_CORE_SIZE),
            worker_max_size: env::var("WORKER_MAX_SIZE")
                .unwrap_or_else(|_| WORKER_MAX_SIZE.to_string())
                .parse()
                .unwrap_or(WORKER_MAX_SIZE),
            worker_queue_capacity: env::var("WORKER_QUEUE_CAPACITY")
                .unwrap_or_else(|_| WORKER_QUEUE_CAPACITY.to_string())
                .parse()
                .unwrap_or(WORKER_QUEUE_CAPACITY),
            stage_timeout_secs: env::var("STAGE_TIMEOUT_SECS")
                .unwrap_or_else(|_| STAGE_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(STAGE_TIMEOUT_SECS),
            preview_enabled: env::var("PREVIEW_ENABLED")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.worker_core_size == 0 {
            return Err(anyhow::anyhow!("WORKER_CORE_SIZE must be at least 1"));
        }

        if self.worker_max_size < self.worker_core_size {
            return Err(anyhow::anyhow!(
                "WORKER_MAX_SIZE ({}) must be >= WORKER_CORE_SIZE ({})",
                self.worker_max_size,
                self.worker_core_size
            ));
        }

        if self.worker_queue_capacity == 0 {
            return Err(anyhow::anyhow!("WORKER_QUEUE_CAPACITY must be at least 1"));
        }

        if self.stage_timeout_secs == 0 {
            return Err(anyhow::anyhow!("STAGE_TIMEOUT_SECS must be at least 1"));
        }

        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be at least 1"));
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig {
                environment: "development".to_string(),
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
            },
            database_url: None,
            local_storage_path: "./data/files".to_string(),
            local_storage_base_url: "http://localhost:8080/files".to_string(),
            max_upload_size_bytes: 100 * 1024 * 1024,
            small_file_threshold_bytes: SMALL_FILE_THRESHOLD_BYTES,
            worker_core_size: 2,
            worker_max_size: 5,
            worker_queue_capacity: 100,
            stage_timeout_secs: 120,
            preview_enabled: true,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineConfig>);

impl Config {
    fn as_pipeline(&self) -> &PipelineConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PipelineConfig::from_env()?;
        config.validate()?;
        Ok(Config(Box::new(config)))
    }

    pub fn environment(&self) -> &str {
        &self.as_pipeline().base.environment
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_pipeline().database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_pipeline().base.db_max_connections
    }

    pub fn db_timeout(&self) -> Duration {
        Duration::from_secs(self.as_pipeline().base.db_timeout_seconds)
    }

    pub fn local_storage_path(&self) -> &str {
        &self.as_pipeline().local_storage_path
    }

    pub fn local_storage_base_url(&self) -> &str {
        &self.as_pipeline().local_storage_base_url
    }

    pub fn max_upload_size_bytes(&self) -> usize {
        self.as_pipeline().max_upload_size_bytes
    }

    pub fn small_file_threshold_bytes(&self) -> u64 {
        self.as_pipeline().small_file_threshold_bytes
    }

    pub fn worker_core_size(&self) -> usize {
        self.as_pipeline().worker_core_size
    }

    pub fn worker_max_size(&self) -> usize {
        self.as_pipeline().worker_max_size
    }

    pub fn worker_queue_capacity(&self) -> usize {
        self.as_pipeline().worker_queue_capacity
    }

    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.as_pipeline().stage_timeout_secs)
    }

    pub fn preview_enabled(&self) -> bool {
        self.as_pipeline().preview_enabled
    }
}
