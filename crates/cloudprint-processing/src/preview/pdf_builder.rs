use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

use super::PreviewError;

/// A4 in PDF points.
pub(crate) const PAGE_WIDTH: i64 = 595;
pub(crate) const PAGE_HEIGHT: i64 = 842;
pub(crate) const PAGE_MARGIN: i64 = 36;

const TITLE_SIZE: i64 = 20;
const BODY_SIZE: i64 = 12;
const LINE_GAP: i64 = 18;
const WRAP_COLUMNS: usize = 80;

fn int(v: i64) -> Object {
    Object::Integer(v)
}

/// Incremental writer for simple preview documents: text-only pages and pages
/// holding a single raster image.
pub(crate) struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    kids: Vec<Object>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        PdfBuilder {
            doc,
            pages_id,
            font_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// A page with a title line followed by wrapped body lines.
    pub fn add_text_page(&mut self, title: &str, lines: &[String]) -> Result<(), PreviewError> {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), int(TITLE_SIZE)]),
            Operation::new(
                "Td",
                vec![int(PAGE_MARGIN + 20), int(PAGE_HEIGHT - PAGE_MARGIN - 60)],
            ),
            Operation::new("Tj", vec![Object::string_literal(pdf_safe(title))]),
            Operation::new("Tf", vec!["F1".into(), int(BODY_SIZE)]),
        ];
        let max_lines = ((PAGE_HEIGHT - 2 * PAGE_MARGIN - 120) / LINE_GAP) as usize;
        for line in lines
            .iter()
            .flat_map(|l| wrap(&pdf_safe(l), WRAP_COLUMNS))
            .take(max_lines)
        {
            operations.push(Operation::new("Td", vec![int(0), int(-LINE_GAP - 4)]));
            operations.push(Operation::new("Tj", vec![Object::string_literal(line)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations }
            .encode()
            .map_err(|e| PreviewError::Pdf(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let resources = dictionary! {
            "Font" => dictionary! { "F1" => self.font_id },
        };
        self.push_page(content_id, resources);
        Ok(())
    }

    /// A page with `image` scaled to fit inside the margins, centered.
    pub fn add_image_page(&mut self, image: &RgbImage) -> Result<(), PreviewError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PreviewError::Image("image has no pixels".to_string()));
        }

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(image.as_raw())
            .map_err(|e| PreviewError::Pdf(e.to_string()))?;
        let pixels = encoder
            .finish()
            .map_err(|e| PreviewError::Pdf(e.to_string()))?;

        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => int(width as i64),
                "Height" => int(height as i64),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => int(8),
                "Filter" => "FlateDecode",
            },
            pixels,
        ));

        let placement = fit_to_page(width, height);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        int(placement.width),
                        int(0),
                        int(0),
                        int(placement.height),
                        int(placement.x),
                        int(placement.y),
                    ],
                ),
                Operation::new("Do", vec!["Im1".into()]),
                Operation::new("Q", vec![]),
            ],
        }
        .encode()
        .map_err(|e| PreviewError::Pdf(e.to_string()))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let resources = dictionary! {
            "XObject" => dictionary! { "Im1" => image_id },
        };
        self.push_page(content_id, resources);
        Ok(())
    }

    fn push_page(&mut self, content_id: ObjectId, resources: lopdf::Dictionary) {
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => resources,
        });
        self.kids.push(page_id.into());
    }

    pub fn finish(mut self) -> Result<Vec<u8>, PreviewError> {
        if self.kids.is_empty() {
            return Err(PreviewError::Pdf("preview has no pages".to_string()));
        }
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => int(count),
            "MediaBox" => vec![int(0), int(0), int(PAGE_WIDTH), int(PAGE_HEIGHT)],
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| PreviewError::Pdf(e.to_string()))?;
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Uniform scale that fits the image inside the page margins, centered.
pub(crate) fn fit_to_page(width: u32, height: u32) -> Placement {
    let avail_w = (PAGE_WIDTH - 2 * PAGE_MARGIN) as f64;
    let avail_h = (PAGE_HEIGHT - 2 * PAGE_MARGIN) as f64;
    let scale = (avail_w / width as f64).min(avail_h / height as f64);
    let w = ((width as f64 * scale).round() as i64).max(1);
    let h = ((height as f64 * scale).round() as i64).max(1);
    Placement {
        x: (PAGE_WIDTH - w) / 2,
        y: (PAGE_HEIGHT - h) / 2,
        width: w,
        height: h,
    }
}

/// Built-in Helvetica text is limited to printable ASCII here; anything else becomes `?`.
fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn wrap(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > columns {
            lines.push(std::mem::take(&mut current));
        }
        let mut word = word;
        while word.len() > columns {
            let (head, tail) = word.split_at(columns);
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            lines.push(head.to_string());
            word = tail;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_image_is_width_bound_and_centered() {
        let p = fit_to_page(1046, 500);
        assert_eq!(p.width, PAGE_WIDTH - 2 * PAGE_MARGIN);
        assert_eq!(p.x, PAGE_MARGIN);
        assert_eq!(p.height, 250);
        assert_eq!(p.y, (PAGE_HEIGHT - 250) / 2);
    }

    #[test]
    fn tall_image_is_height_bound() {
        let p = fit_to_page(100, 1000);
        assert_eq!(p.height, PAGE_HEIGHT - 2 * PAGE_MARGIN);
        assert!(p.width < PAGE_WIDTH - 2 * PAGE_MARGIN);
        assert_eq!(p.x, (PAGE_WIDTH - p.width) / 2);
    }

    #[test]
    fn wrap_splits_long_text() {
        let lines = wrap("aaa bbb ccc", 7);
        assert_eq!(lines, vec!["aaa bbb", "ccc"]);
        assert_eq!(wrap(&"x".repeat(10), 4), vec!["xxxx", "xxxx", "xx"]);
        assert_eq!(wrap("", 10), vec![""]);
    }

    #[test]
    fn non_ascii_replaced() {
        assert_eq!(pdf_safe("报告.docx"), "??.docx");
    }

    #[test]
    fn built_document_reopens_with_page_count() {
        let mut builder = PdfBuilder::new();
        builder.add_text_page("Page 1 of 2", &["a.docx".to_string()]).unwrap();
        builder.add_text_page("Page 2 of 2", &[]).unwrap();
        let bytes = builder.finish().unwrap();
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn empty_builder_fails() {
        assert!(PdfBuilder::new().finish().is_err());
    }
}
