use anyhow::{Context, Result};
use std::io::{Seek, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

pub const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const OFFICE_DOCUMENT_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

pub struct Package<W: Write + Seek> {
    zip: ZipWriter<W>,
}

impl<W: Write + Seek> Package<W> {
    pub fn new(writer: W) -> Self {
        Self { zip: ZipWriter::new(writer) }
    }

    pub fn add(&mut self, path: &str, xml: &str) -> Result<()> {
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        self.zip
            .start_file(path, options)
            .with_context(|| format!("Failed to start package part {}", path))?;
        self.zip.write_all(xml.as_bytes())?;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W> {
        Ok(self.zip.finish()?)
    }
}

/// `_rels/.rels` pointing at the main part of the package.
pub fn root_relationships(main_part: &str) -> String {
    format!(
        r#"{XML_DECL}<Relationships xmlns="{RELS_NS}"><Relationship Id="rId1" Type="{OFFICE_DOCUMENT_REL}" Target="{main_part}"/></Relationships>"#
    )
}

/// Escape text for element content and attribute values. Control characters
/// XML 1.0 cannot carry are dropped; tabs become spaces.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' => out.push(' '),
            '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}
