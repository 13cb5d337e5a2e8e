//! In-memory builders for real documents of every supported format.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::{Cursor, Write};

/// PDF with `pages` empty pages.
pub fn pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for _ in 0..pages {
        let content = Content {
            operations: vec![Operation::new("BT", vec![]), Operation::new("ET", vec![])],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(pages as i64),
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

fn zip_parts(parts: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buf);
        let options = zip::write::FileOptions::default();
        for (name, body) in parts {
            zip.start_file(*name, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf.into_inner()
}

/// Word document with `paragraphs` body paragraphs and no page-count property.
pub fn docx(paragraphs: usize) -> Vec<u8> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    );
    for i in 0..paragraphs {
        xml.push_str(&format!("<w:p><w:r><w:t>Line {}</w:t></w:r></w:p>", i));
    }
    xml.push_str("</w:body></w:document>");
    zip_parts(&[("word/document.xml", xml)])
}

pub fn pptx(slides: usize) -> Vec<u8> {
    let ids: String = (0..slides)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2))
        .collect();
    let xml = format!(
        r#"<?xml version="1.0"?><p:presentation xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><p:sldIdLst>{}</p:sldIdLst></p:presentation>"#,
        ids
    );
    zip_parts(&[("ppt/presentation.xml", xml)])
}

pub fn xlsx(sheets: &[&str]) -> Vec<u8> {
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    let mut parts = Vec::new();
    for (i, name) in sheets.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        workbook.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
        parts.push((
            format!("xl/worksheets/sheet{}.xml", n),
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData/></worksheet>"#.to_string(),
        ));
    }
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    rels.push_str("</Relationships>");

    let mut all = vec![
        ("[Content_Types].xml".to_string(), content_types),
        (
            "_rels/.rels".to_string(),
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
        ),
        ("xl/workbook.xml".to_string(), workbook),
        ("xl/_rels/workbook.xml.rels".to_string(), rels),
    ];
    all.extend(parts);
    let borrowed: Vec<(&str, String)> = all.iter().map(|(n, b)| (n.as_str(), b.clone())).collect();
    zip_parts(&borrowed)
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Word 97 binary holding `text` as one 8-bit piece.
pub fn legacy_doc(text: &str) -> Vec<u8> {
    const TEXT_OFFSET: usize = 0x800;
    let mut word = vec![0u8; TEXT_OFFSET];
    word[0..2].copy_from_slice(&0xA5ECu16.to_le_bytes());
    // fWhichTblStm: tables live in 1Table.
    word[0x0A..0x0C].copy_from_slice(&0x0200u16.to_le_bytes());
    word[0x4C..0x50].copy_from_slice(&(text.len() as u32).to_le_bytes());
    word.extend_from_slice(text.as_bytes());

    let mut plc = Vec::new();
    plc.extend_from_slice(&0u32.to_le_bytes());
    plc.extend_from_slice(&(text.len() as u32).to_le_bytes());
    plc.extend_from_slice(&0u16.to_le_bytes());
    plc.extend_from_slice(&(((TEXT_OFFSET as u32) * 2) | 0x4000_0000).to_le_bytes());
    plc.extend_from_slice(&0u16.to_le_bytes());

    let mut clx = vec![0x02];
    clx.extend_from_slice(&(plc.len() as u32).to_le_bytes());
    clx.extend_from_slice(&plc);

    let table = clx.clone();
    word[0x01A2..0x01A6].copy_from_slice(&0u32.to_le_bytes());
    word[0x01A6..0x01AA].copy_from_slice(&(clx.len() as u32).to_le_bytes());

    let mut file = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    for (name, data) in [("/WordDocument", &word), ("/1Table", &table)] {
        let mut stream = file.create_stream(name).unwrap();
        stream.write_all(data).unwrap();
        stream.flush().unwrap();
    }
    file.flush().unwrap();
    file.into_inner().into_inner()
}

fn biff_record(rec_type: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 4);
    out.extend_from_slice(&rec_type.to_le_bytes());
    out.extend_from_slice(&(body.len() as u16).to_le_bytes());
    out.extend_from_slice(body);
    out
}

fn biff_bof(substream: u16) -> Vec<u8> {
    let mut body = vec![0u8; 16];
    body[0..2].copy_from_slice(&0x0600u16.to_le_bytes());
    body[2..4].copy_from_slice(&substream.to_le_bytes());
    biff_record(0x0809, &body)
}

/// Excel 97 workbook with one empty worksheet per name (ASCII names).
pub fn xls(sheets: &[&str]) -> Vec<u8> {
    let bound_sheet = |pos: u32, name: &str| {
        let mut body = pos.to_le_bytes().to_vec();
        body.extend_from_slice(&[0, 0, name.len() as u8, 0]);
        body.extend_from_slice(name.as_bytes());
        biff_record(0x0085, &body)
    };

    let globals_len = biff_bof(0x0005).len()
        + sheets.iter().map(|n| bound_sheet(0, n).len()).sum::<usize>()
        + biff_record(0x000A, &[]).len();
    let sheet_stream = [biff_bof(0x0010), biff_record(0x000A, &[])].concat();

    let mut workbook = biff_bof(0x0005);
    for (i, name) in sheets.iter().enumerate() {
        let pos = globals_len + i * sheet_stream.len();
        workbook.extend(bound_sheet(pos as u32, name));
    }
    workbook.extend(biff_record(0x000A, &[]));
    for _ in sheets {
        workbook.extend_from_slice(&sheet_stream);
    }

    let mut file =
        cfb::CompoundFile::create_with_version(cfb::Version::V3, Cursor::new(Vec::new())).unwrap();
    {
        let mut stream = file.create_stream("/Workbook").unwrap();
        stream.write_all(&workbook).unwrap();
        stream.flush().unwrap();
    }
    file.flush().unwrap();
    file.into_inner().into_inner()
}

fn ppt_record(ver: u16, instance: u16, rec_type: u16, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&((instance << 4) | ver).to_le_bytes());
    out.extend_from_slice(&rec_type.to_le_bytes());
    out.extend_from_slice(&(body.len() as u32).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// PowerPoint 97 presentation whose live edit chain lists `slides` slides.
pub fn ppt(slides: usize) -> Vec<u8> {
    let mut slide_list = Vec::new();
    for i in 0..slides {
        slide_list.extend(ppt_record(0, 0, 0x03F3, &[i as u8; 20]));
    }
    let mut document_body = ppt_record(0, 0, 0x03E9, &[0u8; 40]);
    document_body.extend(ppt_record(0x0F, 0, 0x0FF0, &slide_list));

    let doc_offset = 0u32;
    let mut stream = ppt_record(0x0F, 0, 0x03E8, &document_body);

    let persist_offset = stream.len() as u32;
    let mut persist_body = ((1u32 << 20) | 1).to_le_bytes().to_vec();
    persist_body.extend_from_slice(&doc_offset.to_le_bytes());
    stream.extend(ppt_record(0, 0, 0x1772, &persist_body));

    let edit_offset = stream.len() as u32;
    let mut edit_body = Vec::new();
    edit_body.extend_from_slice(&0u32.to_le_bytes());
    edit_body.extend_from_slice(&0x0100u16.to_le_bytes());
    edit_body.extend_from_slice(&[0, 3]);
    edit_body.extend_from_slice(&0u32.to_le_bytes());
    edit_body.extend_from_slice(&persist_offset.to_le_bytes());
    edit_body.extend_from_slice(&1u32.to_le_bytes());
    stream.extend(ppt_record(0, 0, 0x0FF5, &edit_body));

    let mut current_user = ppt_record(0, 0, 0x0FF6, &[0u8; 12]);
    current_user[8..12].copy_from_slice(&20u32.to_le_bytes());
    current_user[12..16].copy_from_slice(&0xE391_C05Fu32.to_le_bytes());
    current_user[16..20].copy_from_slice(&edit_offset.to_le_bytes());

    let mut file = cfb::CompoundFile::create(Cursor::new(Vec::new())).unwrap();
    for (name, data) in [("/PowerPoint Document", &stream), ("/Current User", &current_user)] {
        let mut out = file.create_stream(name).unwrap();
        out.write_all(data).unwrap();
        out.flush().unwrap();
    }
    file.flush().unwrap();
    file.into_inner().into_inner()
}

/// Bytes with no recognisable structure.
pub fn opaque(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}
