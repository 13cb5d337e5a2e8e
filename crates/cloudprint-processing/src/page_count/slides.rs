//! Presentations.
//!
//! `.pptx` counts `p:sldId` entries of the presentation part. `.ppt` follows the
//! live edit chain (Current User, UserEditAtom, persist directory) to the
//! DocumentContainer and counts the slide persist atoms of its slide list. When
//! that chain cannot be read the top-level Slide containers are counted instead.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::{BTreeMap, HashSet};

use super::ole::{self, u32_at, RecordHeader, RECORD_HEADER_LEN};
use super::ooxml;
use super::PageCountError;
use crate::format::FileFormat;

const RT_DOCUMENT: u16 = 0x03E8;
const RT_SLIDE: u16 = 0x03EE;
const RT_SLIDE_PERSIST_ATOM: u16 = 0x03F3;
const RT_SLIDE_LIST_WITH_TEXT: u16 = 0x0FF0;
const RT_USER_EDIT_ATOM: u16 = 0x0FF5;
const RT_PERSIST_DIRECTORY_ATOM: u16 = 0x1772;

const CURRENT_USER_OFFSET_TO_EDIT: usize = 16;
const CURRENT_USER_HEADER_TOKEN: usize = 12;
const ENCRYPTED_HEADER_TOKEN: u32 = 0xF3D1_C4DF;
const MAX_EDIT_CHAIN: usize = 4096;

pub(crate) fn count_modern_slides(bytes: &[u8]) -> Result<u32, PageCountError> {
    let format = FileFormat::ModernSlides;
    let mut package = ooxml::open(bytes).map_err(|e| PageCountError::parse(format, e))?;

    let xml = ooxml::read_part(&mut package, "ppt/presentation.xml")
        .map_err(|e| PageCountError::parse(format, e))?;

    match xml {
        Some(xml) => count_slide_ids(&xml),
        None => {
            let slides = package
                .file_names()
                .filter(|name| is_slide_part(name))
                .count();
            if slides == 0 {
                return Err(PageCountError::parse(format, "missing ppt/presentation.xml"));
            }
            Ok(slides as u32)
        }
    }
}

fn is_slide_part(name: &str) -> bool {
    name.strip_prefix("ppt/slides/slide")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .map(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

fn count_slide_ids(xml: &str) -> Result<u32, PageCountError> {
    let mut reader = Reader::from_str(xml);
    let mut in_list = false;
    let mut slides = 0u32;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"sldIdLst" => in_list = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"sldIdLst" => in_list = false,
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if in_list && e.local_name().as_ref() == b"sldId" =>
            {
                slides += 1
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(PageCountError::parse(FileFormat::ModernSlides, e)),
            _ => {}
        }
    }

    Ok(slides)
}

pub(crate) fn count_legacy_slides(bytes: &[u8]) -> Result<u32, PageCountError> {
    let format = FileFormat::LegacySlides;
    let mut file = ole::open(bytes).map_err(|e| PageCountError::parse(format, e))?;
    let document = ole::read_stream(&mut file, "/PowerPoint Document")
        .map_err(|e| PageCountError::parse(format, e))?;

    if let Ok(current_user) = ole::read_stream(&mut file, "/Current User") {
        if u32_at(&current_user, CURRENT_USER_HEADER_TOKEN) == Some(ENCRYPTED_HEADER_TOKEN) {
            return Err(PageCountError::parse(format, "presentation is encrypted"));
        }
        if let Some(count) = u32_at(&current_user, CURRENT_USER_OFFSET_TO_EDIT)
            .and_then(|offset| count_from_edit_chain(&document, offset as usize))
        {
            return Ok(count);
        }
    }

    tracing::debug!("PowerPoint edit chain unreadable, counting slide containers");
    count_slide_containers(&document)
}

/// Walk the UserEditAtom chain, newest first, building the persist directory, then
/// resolve the DocumentContainer and count its slide list.
fn count_from_edit_chain(document: &[u8], mut offset: usize) -> Option<u32> {
    let mut persist: BTreeMap<u32, u32> = BTreeMap::new();
    let mut doc_persist_id: Option<u32> = None;
    let mut visited = HashSet::new();

    while visited.len() < MAX_EDIT_CHAIN && visited.insert(offset) {
        let header = RecordHeader::read(document, offset)?;
        if header.rec_type != RT_USER_EDIT_ATOM {
            return None;
        }
        let body = offset + RECORD_HEADER_LEN;
        let offset_last_edit = u32_at(document, body + 8)?;
        let offset_persist_dir = u32_at(document, body + 12)? as usize;
        if doc_persist_id.is_none() {
            doc_persist_id = Some(u32_at(document, body + 16)?);
        }

        read_persist_directory(document, offset_persist_dir, &mut persist)?;

        if offset_last_edit == 0 {
            break;
        }
        offset = offset_last_edit as usize;
    }

    let doc_offset = *persist.get(&doc_persist_id?)? as usize;
    let doc_header = RecordHeader::read(document, doc_offset)?;
    if doc_header.rec_type != RT_DOCUMENT {
        return None;
    }

    let start = doc_offset + RECORD_HEADER_LEN;
    let end = start.checked_add(doc_header.length as usize)?;
    let slide_list = children(document, start, end)
        .find(|(h, _)| h.rec_type == RT_SLIDE_LIST_WITH_TEXT && h.instance == 0);

    let Some((list_header, list_offset)) = slide_list else {
        // A document without a slide list has no slides.
        return Some(0);
    };
    let list_start = list_offset + RECORD_HEADER_LEN;
    let list_end = list_start.checked_add(list_header.length as usize)?;
    let slides = children(document, list_start, list_end)
        .filter(|(h, _)| h.rec_type == RT_SLIDE_PERSIST_ATOM)
        .count();
    Some(slides as u32)
}

/// Merge one PersistDirectoryAtom into `persist`. Entries already present came
/// from a newer edit and win.
fn read_persist_directory(
    document: &[u8],
    offset: usize,
    persist: &mut BTreeMap<u32, u32>,
) -> Option<()> {
    let header = RecordHeader::read(document, offset)?;
    if header.rec_type != RT_PERSIST_DIRECTORY_ATOM {
        return None;
    }
    let mut pos = offset + RECORD_HEADER_LEN;
    let end = pos.checked_add(header.length as usize)?;
    if end > document.len() {
        return None;
    }

    while pos + 4 <= end {
        let entry = u32_at(document, pos)?;
        let first_id = entry & 0x000F_FFFF;
        let count = (entry >> 20) as usize;
        pos += 4;
        for k in 0..count {
            let target = u32_at(document, pos + 4 * k)?;
            persist.entry(first_id + k as u32).or_insert(target);
        }
        pos += 4 * count;
    }
    Some(())
}

/// Direct child records of the container body `[start, end)`.
fn children(document: &[u8], start: usize, end: usize) -> impl Iterator<Item = (RecordHeader, usize)> + '_ {
    let end = end.min(document.len());
    let mut pos = start;
    std::iter::from_fn(move || {
        if pos + RECORD_HEADER_LEN > end {
            return None;
        }
        let header = RecordHeader::read(document, pos)?;
        let at = pos;
        pos = pos
            .checked_add(RECORD_HEADER_LEN)?
            .checked_add(header.length as usize)?;
        Some((header, at))
    })
}

fn count_slide_containers(document: &[u8]) -> Result<u32, PageCountError> {
    let mut slides = 0u32;
    let mut records = 0usize;
    for (header, _) in children(document, 0, document.len()) {
        records += 1;
        if header.rec_type == RT_SLIDE && header.is_container() {
            slides += 1;
        }
    }
    if records == 0 {
        return Err(PageCountError::parse(
            FileFormat::LegacySlides,
            "PowerPoint Document stream holds no records",
        ));
    }
    Ok(slides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn record(ver: u16, instance: u16, rec_type: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((instance << 4) | ver).to_le_bytes());
        out.extend_from_slice(&rec_type.to_le_bytes());
        out.extend_from_slice(&(body.len() as u32).to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    /// Minimal binary presentation: one DocumentContainer holding a slide list with
    /// `slides` persist atoms, plus a stale Slide container that must not count.
    fn ppt(slides: usize) -> Vec<u8> {
        let mut slide_list_body = Vec::new();
        for i in 0..slides {
            slide_list_body.extend(record(0, 0, RT_SLIDE_PERSIST_ATOM, &[i as u8; 20]));
        }
        let mut document_body = record(0, 0, 0x03E9, &[0u8; 40]);
        document_body.extend(record(0x0F, 0, RT_SLIDE_LIST_WITH_TEXT, &slide_list_body));
        document_body.extend(record(0x0F, 1, RT_SLIDE_LIST_WITH_TEXT, &[]));

        let mut stream = record(0x0F, 0, RT_SLIDE, &[]);
        let doc_offset = stream.len() as u32;
        stream.extend(record(0x0F, 0, RT_DOCUMENT, &document_body));

        let persist_offset = stream.len() as u32;
        let mut persist_body = Vec::new();
        persist_body.extend_from_slice(&((1u32 << 20) | 1).to_le_bytes());
        persist_body.extend_from_slice(&doc_offset.to_le_bytes());
        stream.extend(record(0, 0, RT_PERSIST_DIRECTORY_ATOM, &persist_body));

        let edit_offset = stream.len() as u32;
        let mut edit_body = Vec::new();
        edit_body.extend_from_slice(&0u32.to_le_bytes());
        edit_body.extend_from_slice(&0x0100u16.to_le_bytes());
        edit_body.extend_from_slice(&[0, 3]);
        edit_body.extend_from_slice(&0u32.to_le_bytes());
        edit_body.extend_from_slice(&persist_offset.to_le_bytes());
        edit_body.extend_from_slice(&1u32.to_le_bytes());
        stream.extend(record(0, 0, RT_USER_EDIT_ATOM, &edit_body));

        let mut current_user = record(0, 0, 0x0FF6, &[0u8; 12]);
        current_user[8..12].copy_from_slice(&20u32.to_le_bytes());
        current_user[12..16].copy_from_slice(&0xE391_C05Fu32.to_le_bytes());
        current_user[16..20].copy_from_slice(&edit_offset.to_le_bytes());

        compound(&[("/PowerPoint Document", &stream), ("/Current User", &current_user)])
    }

    fn compound(streams: &[(&str, &[u8])]) -> Vec<u8> {
        let mut file = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
        for (name, data) in streams {
            let mut stream = file.create_stream(name).unwrap();
            stream.write_all(data).unwrap();
            stream.flush().unwrap();
        }
        file.flush().unwrap();
        file.into_inner().into_inner()
    }

    #[test]
    fn ppt_counts_slide_list_entries() {
        assert_eq!(count_legacy_slides(&ppt(4)).unwrap(), 4);
        assert_eq!(count_legacy_slides(&ppt(1)).unwrap(), 1);
    }

    #[test]
    fn ppt_without_current_user_counts_containers() {
        let mut stream = record(0x0F, 0, RT_SLIDE, &[]);
        stream.extend(record(0x0F, 0, RT_SLIDE, &record(0, 0, 0x03EF, &[0u8; 24])));
        stream.extend(record(0x0F, 0, 0x03F8, &[]));
        let bytes = compound(&[("/PowerPoint Document", &stream)]);
        assert_eq!(count_legacy_slides(&bytes).unwrap(), 2);
    }

    #[test]
    fn pptx_counts_slide_ids() {
        let xml = r#"<?xml version="1.0"?><p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="r"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst><p:sldId id="256" r:id="rId2"/><p:sldId id="257" r:id="rId3"/><p:sldId id="258" r:id="rId4"/></p:sldIdLst></p:presentation>"#;
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file("ppt/presentation.xml", zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        assert_eq!(count_modern_slides(&buf.into_inner()).unwrap(), 3);
    }

    #[test]
    fn pptx_without_presentation_part_counts_slide_parts() {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::FileOptions::default();
            for name in [
                "ppt/slides/slide1.xml",
                "ppt/slides/slide2.xml",
                "ppt/slides/_rels/slide1.xml.rels",
            ] {
                zip.start_file(name, options).unwrap();
                zip.write_all(b"<x/>").unwrap();
            }
            zip.finish().unwrap();
        }
        assert_eq!(count_modern_slides(&buf.into_inner()).unwrap(), 2);
    }

    #[test]
    fn slide_part_names() {
        assert!(is_slide_part("ppt/slides/slide12.xml"));
        assert!(!is_slide_part("ppt/slides/slide.xml"));
        assert!(!is_slide_part("ppt/slideLayouts/slideLayout1.xml"));
    }
}
