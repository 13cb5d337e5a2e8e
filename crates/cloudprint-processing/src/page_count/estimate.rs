use cloudprint_core::constants::{MAX_ESTIMATED_PAGES, UNKNOWN_FORMAT_BYTES_PER_PAGE};

/// `ceil(size / 51200)` clamped to `[1, 1000]`.
pub fn estimate_pages_from_size(size: u64) -> u32 {
    let pages = size.div_ceil(UNKNOWN_FORMAT_BYTES_PER_PAGE);
    pages.clamp(1, MAX_ESTIMATED_PAGES as u64) as u32
}
