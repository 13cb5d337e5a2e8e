//! Cloudprint Storage Library
//!
//! Storage abstraction for uploaded originals and generated previews, plus the
//! local filesystem backend.
//!
//! # Storage key format
//!
//! - **Originals**: `uploads/{owner_id}/{uuid}.{ext}`
//! - **Previews**: `previews/{owner_id}/{file_id}.pdf`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod keys;
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use keys::{generate_preview_key, generate_upload_key, sanitize_filename};
pub use local::LocalStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
