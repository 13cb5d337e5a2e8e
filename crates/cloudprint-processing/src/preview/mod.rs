//! Preview normalization.
//!
//! Every stored file gets a printable PDF preview:
//!
//! - PDFs pass through untouched; the stored original is the preview.
//! - Images become a single page with the image fitted inside the margins.
//! - Office documents become one labelled placeholder page per unit (page, worksheet
//!   or slide).
//! - Anything else, or any input that fails to convert, becomes a one-page
//!   conversion-error document carrying the reason.
//!
//! Normalization never fails outright for bad input; only producing the error page
//! itself can fail.

mod pdf_builder;

use cloudprint_core::constants::MAX_ESTIMATED_PAGES;
use image::imageops::FilterType;

use crate::format::FileFormat;
use crate::page_count::{sheet, slides, word, PageCountError};
use pdf_builder::PdfBuilder;

/// Longest image edge embedded in a preview, in pixels.
const MAX_IMAGE_EDGE: u32 = 2000;

#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error("Failed to decode image: {0}")]
    Image(String),

    #[error("Failed to build preview PDF: {0}")]
    Pdf(String),

    #[error("No preview conversion for {0} files")]
    Unsupported(FileFormat),

    #[error(transparent)]
    Count(#[from] PageCountError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// The stored file is already a PDF.
    PassThrough,
    /// A generated preview document.
    Rendered(Vec<u8>),
    /// Conversion failed; `pdf` is the single error page and `reason` the note to record.
    Failed { pdf: Vec<u8>, reason: String },
}

impl PreviewOutcome {
    pub fn note(&self) -> Option<&str> {
        match self {
            PreviewOutcome::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewNormalizer;

impl PreviewNormalizer {
    pub fn new() -> Self {
        PreviewNormalizer
    }

    /// Normalize `bytes` into a preview. Conversion problems are folded into
    /// [`PreviewOutcome::Failed`].
    pub fn normalize(
        &self,
        format: FileFormat,
        bytes: &[u8],
        original_name: &str,
    ) -> Result<PreviewOutcome, PreviewError> {
        if format == FileFormat::Pdf {
            return Ok(PreviewOutcome::PassThrough);
        }

        let rendered = match format {
            FileFormat::Image => render_image(bytes),
            f if f.is_office() => render_placeholders(f, bytes, original_name),
            other => Err(PreviewError::Unsupported(other)),
        };

        match rendered {
            Ok(pdf) => Ok(PreviewOutcome::Rendered(pdf)),
            Err(e) => {
                let reason = e.to_string();
                tracing::debug!(format = %format, reason = %reason, "Preview conversion failed");
                let pdf = error_page(original_name, &reason)?;
                Ok(PreviewOutcome::Failed { pdf, reason })
            }
        }
    }

    /// The single conversion-error page, for failures that happen before
    /// normalization (e.g. the original could not be read).
    pub fn error_document(&self, original_name: &str, reason: &str) -> Result<Vec<u8>, PreviewError> {
        error_page(original_name, reason)
    }
}

fn render_image(bytes: &[u8]) -> Result<Vec<u8>, PreviewError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| PreviewError::Image(e.to_string()))?;
    let decoded = if decoded.width() > MAX_IMAGE_EDGE || decoded.height() > MAX_IMAGE_EDGE {
        decoded.resize(MAX_IMAGE_EDGE, MAX_IMAGE_EDGE, FilterType::Triangle)
    } else {
        decoded
    };

    let mut builder = PdfBuilder::new();
    builder.add_image_page(&decoded.to_rgb8())?;
    builder.finish()
}

fn unit_labels(format: FileFormat, bytes: &[u8]) -> Result<Vec<String>, PreviewError> {
    let labels = match format {
        FileFormat::LegacyWord | FileFormat::ModernWord => {
            let pages = if format == FileFormat::LegacyWord {
                word::count_legacy_pages(bytes)?
            } else {
                word::count_modern_pages(bytes)?
            };
            numbered("Page", pages as usize)
        }
        FileFormat::LegacySheet | FileFormat::ModernSheet => {
            let names = sheet::sheet_names(format, bytes)?;
            let total = names.len();
            names
                .into_iter()
                .enumerate()
                .map(|(i, name)| format!("Sheet {} of {}: {}", i + 1, total, name))
                .collect()
        }
        FileFormat::LegacySlides | FileFormat::ModernSlides => {
            let slides = if format == FileFormat::LegacySlides {
                slides::count_legacy_slides(bytes)?
            } else {
                slides::count_modern_slides(bytes)?
            };
            numbered("Slide", slides as usize)
        }
        other => return Err(PreviewError::Unsupported(other)),
    };
    Ok(labels)
}

fn numbered(unit: &str, total: usize) -> Vec<String> {
    (1..=total)
        .map(|i| format!("{} {} of {}", unit, i, total))
        .collect()
}

fn render_placeholders(
    format: FileFormat,
    bytes: &[u8],
    original_name: &str,
) -> Result<Vec<u8>, PreviewError> {
    let labels = unit_labels(format, bytes)?;
    if labels.is_empty() {
        return Err(PreviewError::Pdf(format!("{} document has no pages", format)));
    }

    let body = vec![
        original_name.to_string(),
        "Placeholder page. The original document is printed as uploaded.".to_string(),
    ];
    let mut builder = PdfBuilder::new();
    for label in labels.iter().take(MAX_ESTIMATED_PAGES as usize) {
        builder.add_text_page(label, &body)?;
    }
    tracing::debug!(
        format = %format,
        pages = builder.page_count(),
        "Rendered placeholder preview"
    );
    builder.finish()
}

fn error_page(original_name: &str, reason: &str) -> Result<Vec<u8>, PreviewError> {
    let mut builder = PdfBuilder::new();
    builder.add_text_page(
        "Preview unavailable",
        &[original_name.to_string(), format!("Conversion error: {}", reason)],
    )?;
    builder.finish()
}
