//! Cloudprint Pipeline
//!
//! [`IngestService`] is the entry point: it stores an upload, creates its record and
//! schedules two independent jobs on the worker pool.
//!
//! - The analysis job walks the record through
//!   `CREATED -> [HASHING ->] ANALYZING -> DONE | FAILED`. Files below the size
//!   threshold skip `HASHING` and are hashed and counted in one step.
//! - The preview job renders a PDF preview and records its path, or a note when
//!   conversion fails. It never changes the record's status.
//!
//! All record updates go through [`RecordWriter`], which serializes writes per id.

pub mod error;
pub mod pipeline;
pub mod preview;
pub mod service;
pub mod writer;

pub use error::StageError;
pub use pipeline::{AnalysisResult, Pipeline, PipelineSettings};
pub use preview::PreviewResult;
pub use service::{stage_error, IngestReceipt, IngestService};
pub use writer::RecordWriter;
