//! Format dispatch.
//!
//! The lower-cased extension of the original display name is the only dispatch
//! key. The declared MIME type is never consulted.

use cloudprint_core::constants::IMAGE_EXTENSIONS;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Pdf,
    LegacyWord,
    ModernWord,
    LegacySheet,
    ModernSheet,
    LegacySlides,
    ModernSlides,
    Image,
    Unknown,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => FileFormat::Pdf,
            "doc" => FileFormat::LegacyWord,
            "docx" => FileFormat::ModernWord,
            "xls" => FileFormat::LegacySheet,
            "xlsx" => FileFormat::ModernSheet,
            "ppt" => FileFormat::LegacySlides,
            "pptx" => FileFormat::ModernSlides,
            e if IMAGE_EXTENSIONS.contains(&e) => FileFormat::Image,
            _ => FileFormat::Unknown,
        }
    }

    /// Dispatch on the extension as [`Path::extension`] reports it, so a bare
    /// dot-file such as `.pdf` has none and is `Unknown`.
    pub fn from_filename(name: &str) -> Self {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(FileFormat::Unknown)
    }

    /// Whether counting needs the file's bytes rather than only its size.
    pub fn needs_content(&self) -> bool {
        !matches!(self, FileFormat::Image | FileFormat::Unknown)
    }

    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, FileFormat::LegacySheet | FileFormat::ModernSheet)
    }

    pub fn is_office(&self) -> bool {
        matches!(
            self,
            FileFormat::LegacyWord
                | FileFormat::ModernWord
                | FileFormat::LegacySheet
                | FileFormat::ModernSheet
                | FileFormat::LegacySlides
                | FileFormat::ModernSlides
        )
    }
}

impl Display for FileFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            FileFormat::Pdf => "pdf",
            FileFormat::LegacyWord => "legacy_word",
            FileFormat::ModernWord => "modern_word",
            FileFormat::LegacySheet => "legacy_sheet",
            FileFormat::ModernSheet => "modern_sheet",
            FileFormat::LegacySlides => "legacy_slides",
            FileFormat::ModernSlides => "modern_slides",
            FileFormat::Image => "image",
            FileFormat::Unknown => "unknown",
        };
        write!(f, "{}", name)
    }
}
