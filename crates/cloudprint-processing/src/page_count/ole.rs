//! Helpers for OLE2 compound files (legacy Office formats).

use std::io::{Cursor, Read};

pub(super) type Compound<'a> = cfb::CompoundFile<Cursor<&'a [u8]>>;

pub(super) fn open(bytes: &[u8]) -> std::io::Result<Compound<'_>> {
    cfb::CompoundFile::open(Cursor::new(bytes))
}

pub(super) fn read_stream(file: &mut Compound<'_>, path: &str) -> std::io::Result<Vec<u8>> {
    let mut stream = file.open_stream(path)?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf)?;
    Ok(buf)
}

pub(super) fn u16_at(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(super) fn u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Header of a binary PowerPoint record.
#[derive(Debug, Clone, Copy)]
pub(super) struct RecordHeader {
    pub version: u8,
    pub instance: u16,
    pub rec_type: u16,
    pub length: u32,
}

pub(super) const RECORD_HEADER_LEN: usize = 8;

impl RecordHeader {
    pub fn read(buf: &[u8], offset: usize) -> Option<Self> {
        let ver_inst = u16_at(buf, offset)?;
        Some(RecordHeader {
            version: (ver_inst & 0x000F) as u8,
            instance: ver_inst >> 4,
            rec_type: u16_at(buf, offset + 2)?,
            length: u32_at(buf, offset + 4)?,
        })
    }

    pub fn is_container(&self) -> bool {
        self.version == 0x0F
    }
}
