//! Shared key generation for storage backends.

use cloudprint_core::constants::{PREVIEW_KEY_PREFIX, UPLOAD_KEY_PREFIX};
use uuid::Uuid;

/// Replace anything outside `[A-Za-z0-9._-]` with `_` so display names can never
/// reach the filesystem verbatim.
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

/// Key for a newly uploaded original: `uploads/{owner_id}/{uuid}.{ext}`.
///
/// The extension is kept so the stored object is recognisable; the stem is random
/// so two uploads with the same display name never collide.
pub fn generate_upload_key(owner_id: i64, original_name: &str) -> String {
    let id = Uuid::new_v4();
    let ext = std::path::Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| sanitize_filename(&e.to_ascii_lowercase()));
    match ext {
        Some(ext) if !ext.is_empty() => format!("{}/{}/{}.{}", UPLOAD_KEY_PREFIX, owner_id, id, ext),
        _ => format!("{}/{}/{}", UPLOAD_KEY_PREFIX, owner_id, id),
    }
}

/// Key for a generated preview: `previews/{owner_id}/{file_id}.pdf`.
pub fn generate_preview_key(owner_id: i64, file_id: i64) -> String {
    format!("{}/{}/{}.pdf", PREVIEW_KEY_PREFIX, owner_id, file_id)
}
