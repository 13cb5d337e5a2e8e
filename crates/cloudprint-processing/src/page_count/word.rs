//! Word documents.
//!
//! `.docx` prefers the `Pages` property from `docProps/app.xml` and falls back to
//! counting body paragraphs. `.doc` extracts the text through the piece table and
//! estimates pages from its length.

use cloudprint_core::constants::{LEGACY_WORD_CHARS_PER_PAGE, MODERN_WORD_PARAGRAPHS_PER_PAGE};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::ole::{self, u16_at, u32_at};
use super::ooxml;
use super::PageCountError;
use crate::format::FileFormat;

const WORD_IDENT: u16 = 0xA5EC;
const FIB_FLAGS: usize = 0x000A;
const FIB_CCP_TEXT: usize = 0x004C;
const FIB_FC_CLX: usize = 0x01A2;
const FIB_LCB_CLX: usize = 0x01A6;
const FLAG_ENCRYPTED: u16 = 0x0100;
const FLAG_WHICH_TABLE: u16 = 0x0200;
const PIECE_COMPRESSED: u32 = 0x4000_0000;
const CLX_PRC: u8 = 0x01;
const CLX_PCDT: u8 = 0x02;

pub(crate) fn count_modern_pages(bytes: &[u8]) -> Result<u32, PageCountError> {
    let mut package =
        ooxml::open(bytes).map_err(|e| PageCountError::parse(FileFormat::ModernWord, e))?;

    if let Some(pages) = read_pages_property(&mut package) {
        return Ok(pages);
    }

    let paragraphs = count_body_paragraphs(&mut package)?;
    Ok((paragraphs / MODERN_WORD_PARAGRAPHS_PER_PAGE).max(1) as u32)
}

/// `<Pages>` from the extended properties, when present and positive.
fn read_pages_property(package: &mut ooxml::Package<'_>) -> Option<u32> {
    let xml = ooxml::read_part(package, "docProps/app.xml").ok()??;
    let mut reader = Reader::from_str(&xml);
    reader.config_mut().trim_text(true);

    let mut in_pages = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => in_pages = e.local_name().as_ref() == b"Pages",
            Ok(Event::Text(t)) if in_pages => {
                let value = std::str::from_utf8(&t).ok()?.trim().parse::<u32>().ok()?;
                return (value > 0).then_some(value);
            }
            Ok(Event::End(_)) => in_pages = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
    }
}

/// Paragraphs that are direct children of `w:body`. Table cell paragraphs are
/// not counted.
fn count_body_paragraphs(package: &mut ooxml::Package<'_>) -> Result<usize, PageCountError> {
    let xml = ooxml::read_part(package, "word/document.xml")
        .map_err(|e| PageCountError::parse(FileFormat::ModernWord, e))?
        .ok_or_else(|| {
            PageCountError::parse(FileFormat::ModernWord, "missing word/document.xml")
        })?;

    let mut reader = Reader::from_str(&xml);
    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut paragraphs = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if body_depth == Some(depth) && name.as_ref() == b"p" {
                    paragraphs += 1;
                }
                if name.as_ref() == b"body" {
                    body_depth = Some(depth + 1);
                }
                depth += 1;
            }
            Ok(Event::Empty(e)) => {
                if body_depth == Some(depth) && e.local_name().as_ref() == b"p" {
                    paragraphs += 1;
                }
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                if e.local_name().as_ref() == b"body" {
                    body_depth = None;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PageCountError::parse(FileFormat::ModernWord, e)),
            _ => {}
        }
    }

    Ok(paragraphs)
}

pub(crate) fn count_legacy_pages(bytes: &[u8]) -> Result<u32, PageCountError> {
    let chars = match extract_legacy_text(bytes) {
        Ok(text) => text.chars().count(),
        Err(TextError::Fatal(e)) => return Err(e),
        Err(TextError::NoPieceTable { ccp_text }) => ccp_text,
    };
    Ok((chars / LEGACY_WORD_CHARS_PER_PAGE).max(1) as u32)
}

pub(crate) enum TextError {
    Fatal(PageCountError),
    /// The document opened but its piece table is unusable. Carries the character
    /// count from the FIB instead.
    NoPieceTable { ccp_text: usize },
}

fn legacy_err(message: impl std::fmt::Display) -> TextError {
    TextError::Fatal(PageCountError::parse(FileFormat::LegacyWord, message))
}

/// Full text of a Word 97-2003 document, all stories included.
pub(crate) fn extract_legacy_text(bytes: &[u8]) -> Result<String, TextError> {
    let mut file = ole::open(bytes).map_err(legacy_err)?;
    let word = ole::read_stream(&mut file, "/WordDocument").map_err(legacy_err)?;

    if u16_at(&word, 0) != Some(WORD_IDENT) {
        return Err(legacy_err("not a Word binary document"));
    }
    let flags = u16_at(&word, FIB_FLAGS).ok_or_else(|| legacy_err("truncated FIB"))?;
    if flags & FLAG_ENCRYPTED != 0 {
        return Err(legacy_err("document is encrypted"));
    }
    let ccp_text = u32_at(&word, FIB_CCP_TEXT).ok_or_else(|| legacy_err("truncated FIB"))? as usize;
    let no_table = TextError::NoPieceTable { ccp_text };

    let table_name = if flags & FLAG_WHICH_TABLE != 0 {
        "/1Table"
    } else {
        "/0Table"
    };
    let table = match ole::read_stream(&mut file, table_name) {
        Ok(table) => table,
        Err(_) => return Err(no_table),
    };

    let (fc_clx, lcb_clx) = match (u32_at(&word, FIB_FC_CLX), u32_at(&word, FIB_LCB_CLX)) {
        (Some(fc), Some(lcb)) if lcb > 0 => (fc as usize, lcb as usize),
        _ => return Err(no_table),
    };
    let clx = match table.get(fc_clx..fc_clx.saturating_add(lcb_clx)) {
        Some(clx) => clx,
        None => return Err(no_table),
    };

    match piece_table_text(clx, &word) {
        Some(text) => Ok(text),
        None => Err(no_table),
    }
}

fn piece_table_text(clx: &[u8], word: &[u8]) -> Option<String> {
    let mut pos = 0usize;
    while pos < clx.len() {
        match clx[pos] {
            CLX_PRC => {
                let cb = u16_at(clx, pos + 1)? as usize;
                pos += 3 + cb;
            }
            CLX_PCDT => {
                let lcb = u32_at(clx, pos + 1)? as usize;
                let plc = clx.get(pos + 5..pos + 5 + lcb)?;
                return decode_pieces(plc, word);
            }
            _ => return None,
        }
    }
    None
}

/// PlcPcd: `n + 1` character positions followed by `n` 8-byte piece descriptors.
fn decode_pieces(plc: &[u8], word: &[u8]) -> Option<String> {
    if plc.len() < 4 || (plc.len() - 4) % 12 != 0 {
        return None;
    }
    let pieces = (plc.len() - 4) / 12;
    let descriptors = 4 * (pieces + 1);
    let mut text = String::new();

    for i in 0..pieces {
        let cp_start = u32_at(plc, 4 * i)? as usize;
        let cp_end = u32_at(plc, 4 * (i + 1))? as usize;
        let chars = cp_end.checked_sub(cp_start)?;
        let fc = u32_at(plc, descriptors + 8 * i + 2)?;

        if fc & PIECE_COMPRESSED != 0 {
            let start = ((fc & !PIECE_COMPRESSED) / 2) as usize;
            let raw = word.get(start..start.checked_add(chars)?)?;
            text.extend(raw.iter().map(|&b| cp1252_char(b)));
        } else {
            let start = fc as usize;
            let raw = word.get(start..start.checked_add(chars.checked_mul(2)?)?)?;
            let units: Vec<u16> = raw
                .chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect();
            text.extend(char::decode_utf16(units).map(|c| c.unwrap_or('\u{FFFD}')));
        }
    }

    Some(text.replace('\r', "\n"))
}

/// Windows-1252 decoding for 8-bit pieces.
fn cp1252_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{20AC}', '\u{FFFD}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}',
        '\u{2021}', '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{FFFD}',
        '\u{017D}', '\u{FFFD}', '\u{FFFD}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}',
        '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}', '\u{2122}', '\u{0161}', '\u{203A}',
        '\u{0153}', '\u{FFFD}', '\u{017E}', '\u{0178}',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}
