pub mod docx;
pub mod ooxml;
pub mod pdf;
pub mod xlsx;

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::assemble::AssembledContent;

/// Where the four output files of one extraction go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub spreadsheet: PathBuf,
    pub document: PathBuf,
    pub toc: PathBuf,
    pub pdf: PathBuf,
}

impl ExportPaths {
    pub fn for_project(out_dir: &Path, project_name: &str) -> Self {
        // Path separators in the project name would escape the output directory.
        let stem = project_name.replace(&['/', '\\'][..], "_");
        Self {
            spreadsheet: out_dir.join(format!("{}_Extracted_SUBMITTALS_Sections.xlsx", stem)),
            document: out_dir.join(format!("{}_Extracted_SUBMITTALS_Sections.docx", stem)),
            toc: out_dir.join(format!("{}_SUBMITTALS_TOC.docx", stem)),
            pdf: out_dir.join(format!("{}_Extracted_SUBMITTALS_Sections.pdf", stem)),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [&self.spreadsheet, &self.document, &self.toc, &self.pdf]
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Render `content` into every output format.
pub fn write_all(content: &AssembledContent, project_name: &str, out_dir: &Path) -> Result<ExportPaths> {
    if !out_dir.exists() {
        tracing::info!("Creating output directory: {:?}", out_dir);
        std::fs::create_dir_all(out_dir)?;
    }
    let paths = ExportPaths::for_project(out_dir, project_name);

    let workbook = xlsx::build_workbook(project_name, content);
    workbook.write_to(create(&paths.spreadsheet)?)?.flush()?;
    tracing::info!("Wrote spreadsheet {:?} ({} sheets)", paths.spreadsheet, workbook.sheets().len());

    docx::build_document(project_name, content)
        .write_to(create(&paths.document)?)?
        .flush()?;
    tracing::info!("Wrote document {:?}", paths.document);

    docx::build_toc_document(project_name, content)
        .write_to(create(&paths.toc)?)?
        .flush()?;
    tracing::info!("Wrote table of contents {:?}", paths.toc);

    let report = pdf::build_report(project_name, content);
    let mut writer = create(&paths.pdf)?;
    report.write_to(&mut writer)?;
    writer.flush()?;
    tracing::info!("Wrote PDF {:?} ({} pages)", paths.pdf, report.page_count());

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::AssembledSection;

    #[test]
    fn file_names_derive_from_project() {
        let paths = ExportPaths::for_project(Path::new("out"), "Pier 9/Phase 2");
        assert_eq!(paths.spreadsheet, Path::new("out/Pier 9_Phase 2_Extracted_SUBMITTALS_Sections.xlsx"));
        assert_eq!(paths.toc, Path::new("out/Pier 9_Phase 2_SUBMITTALS_TOC.docx"));
    }

    #[test]
    fn writes_every_format() {
        let dir = tempfile::tempdir().unwrap();
        let content = AssembledContent {
            sections: vec![AssembledSection {
                heading: "SECTION 01 33 00".into(),
                title: "SUBMITTAL PROCEDURES".into(),
                body: "1.1 SUBMITTALS\nA. Use the portal.".into(),
            }],
        };
        let out = dir.path().join("exports");
        let paths = write_all(&content, "Harbor", &out).unwrap();
        for path in paths.all() {
            let len = std::fs::metadata(path).unwrap().len();
            assert!(len > 0, "{:?} is empty", path);
        }
    }
}
