//! Cloudprint Core Library
//!
//! Domain models, error types, configuration and constants shared by every
//! crate of the file-ingestion pipeline.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PipelineConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{FileRecord, FileRecordId, FileStatus, NewFileRecord, TransitionError};
