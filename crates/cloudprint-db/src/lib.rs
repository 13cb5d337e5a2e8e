//! Record store for the ingestion pipeline.
//!
//! [`FileRecordRepository`] is the only persistence seam: every write is a
//! full-record upsert keyed by id, last write wins. [`PgFileRecordRepository`] is
//! the production backend; [`InMemoryFileRecordRepository`] backs tests and
//! database-less runs.

mod memory;
mod postgres;
mod repository;

pub use memory::InMemoryFileRecordRepository;
pub use postgres::{connect, PgFileRecordRepository};
pub use repository::FileRecordRepository;
