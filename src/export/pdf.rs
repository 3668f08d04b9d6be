use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

use crate::assemble::AssembledContent;

// A4 in points.
const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 56.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font: &'static str,
    pub size: f32,
    /// Characters per line before wrapping.
    pub wrap: usize,
}

impl TextStyle {
    fn leading(&self) -> f32 {
        self.size * 1.35
    }
}

/// Fixed style sheet: F1 is Helvetica, F2 Helvetica-Bold.
pub const TITLE: TextStyle = TextStyle { font: "F2", size: 18.0, wrap: 42 };
pub const HEADING: TextStyle = TextStyle { font: "F2", size: 13.0, wrap: 62 };
pub const BODY: TextStyle = TextStyle { font: "F1", size: 10.0, wrap: 92 };

#[derive(Debug, Clone, PartialEq)]
enum Flowable {
    Text(TextStyle, String),
    Spacer(f32),
    PageBreak,
}

#[derive(Debug, Default)]
pub struct PdfReport {
    flow: Vec<Flowable>,
}

impl PdfReport {
    pub fn text(&mut self, style: TextStyle, text: &str) -> &mut Self {
        for line in text.lines() {
            if line.trim().is_empty() {
                self.flow.push(Flowable::Spacer(style.leading()));
                continue;
            }
            for wrapped in textwrap::wrap(line, style.wrap) {
                self.flow.push(Flowable::Text(style, wrapped.into_owned()));
            }
        }
        self
    }

    pub fn spacer(&mut self, height: f32) -> &mut Self {
        self.flow.push(Flowable::Spacer(height));
        self
    }

    pub fn page_break(&mut self) -> &mut Self {
        self.flow.push(Flowable::PageBreak);
        self
    }

    /// Lay the flow out onto pages: one list of (style, x, y, text) per page.
    fn layout(&self) -> Vec<Vec<(TextStyle, f32, f32, String)>> {
        let top = PAGE_HEIGHT - MARGIN;
        let mut pages = vec![Vec::new()];
        let mut y = top;

        for item in &self.flow {
            match item {
                Flowable::PageBreak => {
                    pages.push(Vec::new());
                    y = top;
                }
                Flowable::Spacer(height) => y -= height,
                Flowable::Text(style, line) => {
                    if y - style.leading() < MARGIN {
                        pages.push(Vec::new());
                        y = top;
                    }
                    y -= style.leading();
                    if let Some(page) = pages.last_mut() {
                        page.push((*style, MARGIN, y, line.clone()));
                    }
                }
            }
        }
        pages
    }

    pub fn page_count(&self) -> usize {
        self.layout().len()
    }

    pub fn to_document(&self) -> Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular = doc.add_object(font("Helvetica"));
        let bold = doc.add_object(font("Helvetica-Bold"));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => regular,
                "F2" => bold,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in self.layout() {
            let mut operations = Vec::new();
            for (style, x, y, text) in page {
                operations.extend(vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![style.font.into(), style.size.into()]),
                    Operation::new("Td", vec![x.into(), y.into()]),
                    Operation::new("Tj", vec![Object::string_literal(win_ansi(&text))]),
                    Operation::new("ET", vec![]),
                ]);
            }
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().context("Failed to encode page content")?,
            ));
            let page_id: ObjectId = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();
        Ok(doc)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut doc = self.to_document()?;
        doc.save_to(writer).context("Failed to write PDF")?;
        Ok(())
    }
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

/// Standard fonts only cover WinAnsi; anything outside Latin-1 becomes '?'.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter_map(|c| match c as u32 {
            0x09 => Some(b' '),
            0x00..=0x1F | 0x7F..=0x9F => None,
            code @ 0x20..=0xFF => Some(code as u8),
            _ => Some(b'?'),
        })
        .collect()
}

/// Title page, then each section on a new page.
pub fn build_report(project_name: &str, content: &AssembledContent) -> PdfReport {
    let mut report = PdfReport::default();
    report
        .text(TITLE, project_name)
        .spacer(6.0)
        .text(TITLE, "EXTRACTED SUBMITTALS");
    for section in &content.sections {
        report
            .page_break()
            .text(HEADING, &section.caption())
            .spacer(8.0)
            .text(BODY, &section.body);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::AssembledSection;

    fn section(body: String) -> AssembledSection {
        AssembledSection {
            heading: "SECTION 05 12 00".into(),
            title: "STRUCTURAL STEEL".into(),
            body,
        }
    }

    #[test]
    fn one_page_per_short_section_after_title_page() {
        let content = AssembledContent {
            sections: vec![section("1.1 SUBMITTALS".into()), section("1.2 ACTION SUBMITTALS".into())],
        };
        let report = build_report("Harbor Bridge", &content);
        assert_eq!(report.page_count(), 3);

        let mut bytes = Vec::new();
        report.write_to(&mut bytes).unwrap();
        let loaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(loaded.get_pages().len(), 3);
    }

    #[test]
    fn long_sections_paginate() {
        let body = (0..200).map(|i| format!("A.{} Shop drawing item.", i)).collect::<Vec<_>>().join("\n");
        let report = build_report("P", &AssembledContent { sections: vec![section(body)] });
        assert!(report.page_count() >= 3);
    }

    #[test]
    fn long_lines_wrap() {
        let mut report = PdfReport::default();
        report.text(BODY, &"word ".repeat(60));
        assert_eq!(report.flow.len(), 4);
    }

    #[test]
    fn win_ansi_replaces_unsupported_chars() {
        assert_eq!(win_ansi("Caf\u{e9} \u{2192} ok\u{7}"), b"Caf\xe9 ? ok".to_vec());
    }
}
