//! Cloudprint Processing Library
//!
//! Everything the pipeline does to a stored file's bytes:
//!
//! - [`hasher`]: streaming SHA-256 content digest
//! - [`format`]: extension-based format dispatch
//! - [`page_count`]: per-format page counters behind lenient and strict strategies
//! - [`preview`]: PDF preview normalization
//!
//! All parsing here is synchronous and CPU-bound; async callers should run it on a
//! blocking thread.

pub mod format;
pub mod hasher;
pub mod page_count;
pub mod preview;

pub use format::FileFormat;
pub use hasher::{hash_bytes, hash_stream, HashError};
pub use page_count::{
    LenientPageCounter, PageCountError, PageCountStrategy, PageSource, StrictPageCounter,
};
pub use preview::{PreviewError, PreviewNormalizer, PreviewOutcome};
