use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::assemble::{self, AssembledContent, AssemblyOptions};
use crate::error::InputError;
use crate::export::{self, ExportPaths};
use crate::pdf::{self, PageRange};
use crate::sections::{self, Origin, SectionIdentifier};

/// Raw values for one extraction, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct ExtractionInputs {
    pub pdf: Option<PathBuf>,
    pub project_name: String,
    pub toc_start: usize,
    pub toc_end: usize,
    pub special_section: String,
    pub options: AssemblyOptions,
    pub out_dir: PathBuf,
}

/// A validated extraction request. Everything the pipeline needs travels here.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub pdf: PathBuf,
    pub project_name: String,
    pub toc_pages: PageRange,
    pub special_section: String,
    pub options: AssemblyOptions,
    pub out_dir: PathBuf,
}

impl ExtractionInputs {
    pub fn validate(self) -> Result<ExtractionRequest, InputError> {
        let pdf = validate_pdf(self.pdf.as_deref())?;
        let project_name = self.project_name.trim().to_string();
        if project_name.is_empty() {
            return Err(InputError::MissingProjectName);
        }
        let special_section = self.special_section.trim().to_string();
        if special_section.is_empty() {
            return Err(InputError::MissingSpecialSection);
        }
        let toc_pages = PageRange::new(self.toc_start, self.toc_end)?;

        Ok(ExtractionRequest {
            pdf,
            project_name,
            toc_pages,
            special_section,
            options: self.options,
            out_dir: self.out_dir,
        })
    }
}

pub fn validate_pdf(path: Option<&Path>) -> Result<PathBuf, InputError> {
    match path {
        Some(p) if p.is_file() => Ok(p.to_path_buf()),
        _ => Err(InputError::MissingPdf),
    }
}

pub fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Identifiers found on the table-of-contents pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocListing {
    pub identifiers: Vec<SectionIdentifier>,
}

impl TocListing {
    pub fn from_text(toc_text: &str) -> Self {
        Self { identifiers: sections::collect_identifiers(toc_text) }
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// An empty listing leaves nothing to extract.
    pub fn ensure_not_empty(&self, pages: PageRange) -> Result<(), InputError> {
        if self.is_empty() {
            return Err(InputError::NoSectionNumbers { start: pages.start, end: pages.end });
        }
        Ok(())
    }

    pub fn section_numbers(&self) -> impl Iterator<Item = &str> {
        self.tokens(Origin::Mined)
    }

    pub fn addenda(&self) -> impl Iterator<Item = &str> {
        self.tokens(Origin::Addendum)
    }

    fn tokens(&self, origin: Origin) -> impl Iterator<Item = &str> {
        self.identifiers
            .iter()
            .filter(move |i| i.origin == origin)
            .map(|i| i.token.as_str())
    }
}

pub fn mine_toc(pdf_bytes: &[u8], pages: PageRange) -> Result<TocListing> {
    let toc_text = pdf::extract_page_range(pdf_bytes, pages)?;
    Ok(TocListing::from_text(&toc_text))
}

/// Pull every listed section out of the full document text.
pub fn assemble_document(pdf_bytes: &[u8], listing: &TocListing, request: &ExtractionRequest) -> Result<AssembledContent> {
    let full_text = pdf::extract_full_text(pdf_bytes)?;
    Ok(assemble::assemble(
        &full_text,
        &listing.identifiers,
        &request.special_section,
        request.options,
    ))
}

#[derive(Debug)]
pub struct ExtractionOutcome {
    pub content: AssembledContent,
    pub paths: ExportPaths,
}

/// Assemble and write all four outputs for a confirmed listing.
pub fn run_extraction(pdf_bytes: &[u8], listing: &TocListing, request: &ExtractionRequest) -> Result<ExtractionOutcome> {
    listing.ensure_not_empty(request.toc_pages)?;
    tracing::info!(
        "Extracting {} sections for project {:?} (special section {})",
        listing.identifiers.len(),
        request.project_name,
        request.special_section
    );
    let content = assemble_document(pdf_bytes, listing, request)?;
    if content.is_empty() {
        tracing::warn!("No submittal content found; writing empty documents");
    }
    let paths = export::write_all(&content, &request.project_name, &request.out_dir)?;
    Ok(ExtractionOutcome { content, paths })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pdf: &Path) -> ExtractionInputs {
        ExtractionInputs {
            pdf: Some(pdf.to_path_buf()),
            project_name: " Harbor Bridge ".into(),
            toc_start: 2,
            toc_end: 4,
            special_section: "01 33 00".into(),
            options: AssemblyOptions::default(),
            out_dir: PathBuf::from("out"),
        }
    }

    #[test]
    fn valid_inputs_become_a_request() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let request = inputs(file.path()).validate().unwrap();
        assert_eq!(request.project_name, "Harbor Bridge");
        assert_eq!(request.toc_pages, PageRange { start: 2, end: 4 });
    }

    #[test]
    fn missing_inputs_are_reported() {
        let file = tempfile::NamedTempFile::new().unwrap();

        let no_pdf = ExtractionInputs { pdf: None, ..inputs(file.path()) };
        assert_eq!(no_pdf.validate().unwrap_err(), InputError::MissingPdf);

        let gone = inputs(&file.path().with_extension("missing"));
        assert_eq!(gone.validate().unwrap_err(), InputError::MissingPdf);

        let blank = ExtractionInputs { project_name: "  ".into(), ..inputs(file.path()) };
        assert_eq!(blank.validate().unwrap_err(), InputError::MissingProjectName);

        let no_special = ExtractionInputs { special_section: String::new(), ..inputs(file.path()) };
        assert_eq!(no_special.validate().unwrap_err(), InputError::MissingSpecialSection);

        let reversed = ExtractionInputs { toc_start: 5, toc_end: 3, ..inputs(file.path()) };
        assert_eq!(
            reversed.validate().unwrap_err(),
            InputError::InvalidPageRange { start: 5, end: 3 }
        );
    }

    #[test]
    fn listing_splits_mined_and_addenda() {
        let toc = "SECTION 01 33 00 SUBMITTAL PROCEDURES\nSECTION 05 12 00 STRUCTURAL STEEL\n05 12 00.01 ADDENDUM";
        let listing = TocListing::from_text(toc);
        let mined: Vec<&str> = listing.section_numbers().collect();
        let addenda: Vec<&str> = listing.addenda().collect();
        assert_eq!(mined, vec!["01 33 00", "05 12 00"]);
        assert_eq!(addenda, vec!["05 12 00.01"]);
        assert!(listing.ensure_not_empty(PageRange { start: 1, end: 1 }).is_ok());
    }

    #[test]
    fn empty_listing_writes_nothing() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("exports");
        let request = ExtractionInputs { out_dir: out_dir.clone(), ..inputs(file.path()) }
            .validate()
            .unwrap();

        let listing = TocListing::from_text("TABLE OF CONTENTS\nDIVISION 01 GENERAL REQUIREMENTS");
        assert!(listing.is_empty());
        assert_eq!(
            listing.ensure_not_empty(request.toc_pages).unwrap_err(),
            InputError::NoSectionNumbers { start: 2, end: 4 }
        );

        let err = run_extraction(b"unused", &listing, &request).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InputError>(),
            Some(&InputError::NoSectionNumbers { start: 2, end: 4 })
        );
        assert!(!out_dir.exists());
    }
}
