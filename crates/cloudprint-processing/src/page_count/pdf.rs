use super::PageCountError;
use crate::format::FileFormat;

pub(crate) fn count_pages(bytes: &[u8]) -> Result<u32, PageCountError> {
    let document = lopdf::Document::load_mem(bytes)
        .map_err(|e| PageCountError::parse(FileFormat::Pdf, e))?;
    let pages = document.get_pages().len();
    if pages == 0 {
        return Err(PageCountError::parse(FileFormat::Pdf, "document has no pages"));
    }
    Ok(pages as u32)
}
