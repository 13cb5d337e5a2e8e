//! Page counting.
//!
//! [`PageCountStrategy`] is the seam the pipeline depends on. Two strategies exist:
//!
//! - [`LenientPageCounter`] counts every format, estimating from size when the
//!   extension is not recognised.
//! - [`StrictPageCounter`] refuses spreadsheets and unrecognised extensions with
//!   [`PageCountError::Unsupported`].
//!
//! Both share the same per-format counters.

mod estimate;
mod ole;
mod ooxml;
pub(crate) mod pdf;
pub(crate) mod sheet;
pub(crate) mod slides;
pub(crate) mod word;

pub use estimate::estimate_pages_from_size;

use crate::format::FileFormat;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageCountError {
    #[error("Failed to parse {format} document: {message}")]
    Parse { format: FileFormat, message: String },

    #[error("Page counting is not supported for {0} files")]
    Unsupported(FileFormat),

    #[error("Content of the {0} file was not loaded")]
    ContentMissing(FileFormat),
}

impl PageCountError {
    pub(crate) fn parse(format: FileFormat, message: impl std::fmt::Display) -> Self {
        PageCountError::Parse {
            format,
            message: message.to_string(),
        }
    }
}

/// What a counter gets to look at.
#[derive(Debug, Clone, Copy)]
pub enum PageSource<'a> {
    Bytes(&'a [u8]),
    /// Only the stored size is known. Enough for images and unknown formats.
    SizeOnly(u64),
}

impl<'a> PageSource<'a> {
    pub fn size(&self) -> u64 {
        match self {
            PageSource::Bytes(b) => b.len() as u64,
            PageSource::SizeOnly(size) => *size,
        }
    }

    fn content(&self, format: FileFormat) -> Result<&'a [u8], PageCountError> {
        match self {
            PageSource::Bytes(b) => Ok(b),
            PageSource::SizeOnly(_) => Err(PageCountError::ContentMissing(format)),
        }
    }
}

pub trait PageCountStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn count(&self, format: FileFormat, source: PageSource<'_>) -> Result<u32, PageCountError>;
}

fn count_any(format: FileFormat, source: PageSource<'_>) -> Result<u32, PageCountError> {
    match format {
        FileFormat::Pdf => pdf::count_pages(source.content(format)?),
        FileFormat::LegacyWord => word::count_legacy_pages(source.content(format)?),
        FileFormat::ModernWord => word::count_modern_pages(source.content(format)?),
        FileFormat::LegacySheet | FileFormat::ModernSheet => {
            sheet::count_sheets(format, source.content(format)?)
        }
        FileFormat::LegacySlides => slides::count_legacy_slides(source.content(format)?),
        FileFormat::ModernSlides => slides::count_modern_slides(source.content(format)?),
        FileFormat::Image => Ok(1),
        FileFormat::Unknown => Ok(estimate_pages_from_size(source.size())),
    }
}

/// Counts every format; unknown extensions are estimated from size.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientPageCounter;

impl PageCountStrategy for LenientPageCounter {
    fn name(&self) -> &'static str {
        "lenient"
    }

    fn count(&self, format: FileFormat, source: PageSource<'_>) -> Result<u32, PageCountError> {
        count_any(format, source)
    }
}

/// Rejects spreadsheets and unrecognised extensions instead of estimating.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictPageCounter;

impl PageCountStrategy for StrictPageCounter {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn count(&self, format: FileFormat, source: PageSource<'_>) -> Result<u32, PageCountError> {
        if format.is_spreadsheet() || format == FileFormat::Unknown {
            return Err(PageCountError::Unsupported(format));
        }
        count_any(format, source)
    }
}
