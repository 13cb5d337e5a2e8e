use calamine::{Reader, Xls, Xlsx};
use std::io::Cursor;

use super::PageCountError;
use crate::format::FileFormat;

/// Worksheet names in workbook order.
pub(crate) fn sheet_names(format: FileFormat, bytes: &[u8]) -> Result<Vec<String>, PageCountError> {
    match format {
        FileFormat::LegacySheet => {
            let workbook: Xls<_> =
                Xls::new(Cursor::new(bytes)).map_err(|e| PageCountError::parse(format, e))?;
            Ok(workbook.sheet_names().to_vec())
        }
        FileFormat::ModernSheet => {
            let workbook: Xlsx<_> =
                Xlsx::new(Cursor::new(bytes)).map_err(|e| PageCountError::parse(format, e))?;
            Ok(workbook.sheet_names().to_vec())
        }
        other => Err(PageCountError::Unsupported(other)),
    }
}

pub(crate) fn count_sheets(format: FileFormat, bytes: &[u8]) -> Result<u32, PageCountError> {
    Ok(sheet_names(format, bytes)?.len() as u32)
}
