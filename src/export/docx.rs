use anyhow::Result;
use docx_rs::{AlignmentType, BreakType, Docx, Paragraph, Run, Style, StyleType, TableOfContents};
use std::io::{Seek, Write};

use crate::assemble::AssembledContent;

const HEADING_STYLE: &str = "Heading1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Centred, bold, level-1 heading.
    Heading(String),
    /// Body text; line breaks inside are kept.
    Paragraph(String),
    PageBreak,
    /// Table of contents over heading levels 1-3, filled in by the word processor.
    TocField,
}

#[derive(Debug, Default)]
pub struct WordDocument {
    pub blocks: Vec<Block>,
}

impl WordDocument {
    pub fn heading(&mut self, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Heading(text.into()));
        self
    }

    pub fn paragraph(&mut self, text: impl Into<String>) -> &mut Self {
        self.blocks.push(Block::Paragraph(text.into()));
        self
    }

    pub fn page_break(&mut self) -> &mut Self {
        self.blocks.push(Block::PageBreak);
        self
    }

    pub fn toc_field(&mut self) -> &mut Self {
        self.blocks.push(Block::TocField);
        self
    }

    pub fn to_docx(&self) -> Docx {
        let heading_style = Style::new(HEADING_STYLE, StyleType::Paragraph).name("Heading 1");
        let mut docx = Docx::new().add_style(heading_style);

        for block in &self.blocks {
            docx = match block {
                Block::Heading(text) => docx.add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text(text.as_str()).bold())
                        .style(HEADING_STYLE)
                        .align(AlignmentType::Center),
                ),
                Block::Paragraph(text) => docx.add_paragraph(Paragraph::new().add_run(multiline_run(text))),
                Block::PageBreak => {
                    docx.add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)))
                }
                Block::TocField => {
                    docx.add_table_of_contents(TableOfContents::new().heading_styles_range(1, 3))
                }
            };
        }
        docx
    }

    pub fn write_to<W: Write + Seek>(&self, mut writer: W) -> Result<W> {
        self.to_docx()
            .build()
            .pack(&mut writer)
            .map_err(|e| anyhow::anyhow!("Failed to pack word document: {}", e))?;
        Ok(writer)
    }
}

fn multiline_run(text: &str) -> Run {
    let mut run = Run::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            run = run.add_break(BreakType::TextWrapping);
        }
        run = run.add_text(line);
    }
    run
}

/// Project title, a TOC field, then each section on its own page.
pub fn build_document(project_name: &str, content: &AssembledContent) -> WordDocument {
    let mut doc = WordDocument::default();
    doc.heading(project_name).heading("EXTRACTED SUBMITTALS").toc_field();
    for section in &content.sections {
        doc.page_break()
            .heading(section.caption())
            .paragraph(section.body.clone());
    }
    doc
}

/// Heading/title pairs only, no body text.
pub fn build_toc_document(project_name: &str, content: &AssembledContent) -> WordDocument {
    let mut doc = WordDocument::default();
    doc.heading(project_name).heading("TABLE OF CONTENTS");
    for caption in content.table_of_contents() {
        doc.paragraph(caption);
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::AssembledSection;
    use std::io::{Cursor, Read};

    fn content() -> AssembledContent {
        AssembledContent {
            sections: vec![
                AssembledSection {
                    heading: "SECTION 01 33 00".into(),
                    title: "SUBMITTAL PROCEDURES".into(),
                    body: "1.1 SUBMITTALS\nA. Use the <portal> & email.".into(),
                },
                AssembledSection {
                    heading: "SECTION 03 30 00".into(),
                    title: "CONCRETE".into(),
                    body: "1.2 ACTION SUBMITTALS\nA. Mix designs.".into(),
                },
            ],
        }
    }

    fn document_xml(doc: &WordDocument) -> String {
        let bytes = doc.write_to(Cursor::new(Vec::new())).unwrap().into_inner();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut xml = String::new();
        archive.by_name("word/document.xml").unwrap().read_to_string(&mut xml).unwrap();
        xml
    }

    #[test]
    fn each_section_starts_on_a_new_page() {
        let doc = build_document("Harbor Bridge", &content());
        assert_eq!(doc.blocks.iter().filter(|b| **b == Block::PageBreak).count(), 2);
        assert_eq!(doc.blocks[2], Block::TocField);
        assert_eq!(doc.blocks[4], Block::Heading("SECTION 01 33 00 - SUBMITTAL PROCEDURES".into()));
    }

    #[test]
    fn packaged_document_holds_text_breaks_and_toc() {
        let xml = document_xml(&build_document("Harbor Bridge", &content()));
        assert!(xml.matches(r#"w:type="page""#).count() >= 2);
        assert!(xml.contains(r#"TOC \o"#));
        assert!(xml.contains("SECTION 03 30 00 - CONCRETE"));
        assert!(xml.contains("A. Use the &lt;portal&gt; &amp; email."));
        assert!(xml.contains(HEADING_STYLE));
        assert!(xml.find("Harbor Bridge").unwrap() < xml.find("SECTION 01 33 00").unwrap());
    }

    #[test]
    fn toc_document_lists_captions_only() {
        let doc = build_toc_document("Harbor Bridge", &content());
        assert_eq!(
            doc.blocks,
            vec![
                Block::Heading("Harbor Bridge".into()),
                Block::Heading("TABLE OF CONTENTS".into()),
                Block::Paragraph("SECTION 01 33 00 - SUBMITTAL PROCEDURES".into()),
                Block::Paragraph("SECTION 03 30 00 - CONCRETE".into()),
            ]
        );
        let xml = document_xml(&doc);
        assert!(!xml.contains("Mix designs"));
    }
}
