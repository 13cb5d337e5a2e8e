//! Helpers for Office Open XML packages (docx, xlsx, pptx).

use std::io::{Cursor, Read};
use zip::result::ZipError;
use zip::ZipArchive;

pub(super) type Package<'a> = ZipArchive<Cursor<&'a [u8]>>;

pub(super) fn open(bytes: &[u8]) -> Result<Package<'_>, ZipError> {
    ZipArchive::new(Cursor::new(bytes))
}

/// Read a part as UTF-8 text. `Ok(None)` when the part does not exist.
pub(super) fn read_part(package: &mut Package<'_>, name: &str) -> Result<Option<String>, ZipError> {
    let mut part = match package.by_name(name) {
        Ok(part) => part,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut text = String::new();
    part.read_to_string(&mut text)?;
    Ok(Some(text))
}
