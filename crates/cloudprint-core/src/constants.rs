//! Pipeline-wide constants.

/// Files strictly below this size take the fast path and are never observed in `HASHING`.
pub const SMALL_FILE_THRESHOLD_BYTES: u64 = 1024 * 1024;

/// Chunk size used when streaming stored content through the hasher.
pub const HASH_CHUNK_SIZE: usize = 8 * 1024;

/// Bytes per estimated page for formats without a dedicated counter.
pub const UNKNOWN_FORMAT_BYTES_PER_PAGE: u64 = 51_200;

/// Upper bound for size-based page estimates.
pub const MAX_ESTIMATED_PAGES: u32 = 1000;

/// Characters per page when estimating legacy Word documents.
pub const LEGACY_WORD_CHARS_PER_PAGE: usize = 2000;

/// Paragraphs per page when a modern Word document has no page-count property.
pub const MODERN_WORD_PARAGRAPHS_PER_PAGE: usize = 20;

/// Raster image extensions counted as a single page.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

/// Storage key prefix for uploaded originals.
pub const UPLOAD_KEY_PREFIX: &str = "uploads";

/// Storage key prefix for generated previews.
pub const PREVIEW_KEY_PREFIX: &str = "previews";
