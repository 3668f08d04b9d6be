use anyhow::Result;

use crate::error::InputError;

/// 1-based inclusive page range, used to locate the table of contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
}

impl PageRange {
    pub fn new(start: usize, end: usize) -> Result<Self, InputError> {
        if start == 0 || start > end {
            return Err(InputError::InvalidPageRange { start, end });
        }
        Ok(Self { start, end })
    }
}

/// Extract the text of the pages in `range`, concatenated in page order.
/// Pages past the end of the document are ignored.
pub fn extract_page_range(bytes: &[u8], range: PageRange) -> Result<String> {
    let pages = guarded(|| pdf_extract::extract_text_from_mem_by_pages(bytes))?;
    tracing::debug!("PDF has {} pages, reading TOC pages {}-{}", pages.len(), range.start, range.end);

    let text: String = pages
        .iter()
        .skip(range.start - 1)
        .take(range.end - range.start + 1)
        .map(String::as_str)
        .collect();

    Ok(normalize_text(&text))
}

/// Extract the text of the whole document.
pub fn extract_full_text(bytes: &[u8]) -> Result<String> {
    let text = guarded(|| pdf_extract::extract_text_from_mem(bytes))?;
    tracing::debug!("Extracted {} bytes of text from PDF", text.len());
    Ok(normalize_text(&text))
}

// pdf-extract panics on some malformed inputs; keep that from taking the process down.
fn guarded<T, E, F>(f: F) -> Result<T>
where
    F: FnOnce() -> std::result::Result<T, E>,
    E: std::fmt::Display,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => anyhow::bail!("PDF text extraction failed: {}", e),
        Err(_) => anyhow::bail!("PDF text extraction panicked"),
    }
}

/// Fix ligatures and typographic punctuation left behind by PDF text
/// extraction. Line breaks are kept: headings and subsection markers are
/// matched line by line downstream.
pub fn normalize_text(text: &str) -> String {
    text
        // Ligatures
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace('\u{FB05}', "st")
        .replace('\u{FB06}', "st")
        // Punctuation
        .replace('\u{2019}', "'")
        .replace('\u{2018}', "'")
        .replace('\u{201C}', "\"")
        .replace('\u{201D}', "\"")
        .replace('\u{2013}', "-")
        .replace('\u{2014}', "-")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::{AssembledContent, AssembledSection};
    use crate::export::pdf::build_report;

    /// Title page followed by one page per marker.
    fn four_page_pdf() -> Vec<u8> {
        let sections = ["ALPHA", "BRAVO", "CHARLIE"]
            .iter()
            .map(|marker| AssembledSection {
                heading: "SECTION 01 33 00".into(),
                title: "SUBMITTAL PROCEDURES".into(),
                body: marker.to_string(),
            })
            .collect();
        let report = build_report("Harbor", &AssembledContent { sections });
        assert_eq!(report.page_count(), 4);
        let mut bytes = Vec::new();
        report.write_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn page_range_rejects_bad_bounds() {
        assert_eq!(
            PageRange::new(0, 3),
            Err(InputError::InvalidPageRange { start: 0, end: 3 })
        );
        assert_eq!(
            PageRange::new(5, 4),
            Err(InputError::InvalidPageRange { start: 5, end: 4 })
        );
        assert_eq!(PageRange::new(2, 2), Ok(PageRange { start: 2, end: 2 }));
    }

    #[test]
    fn normalize_keeps_lines() {
        let text = "SECTION 01 33 00\r\nSUBMITTAL PROCEDURES \u{2014} GENERAL\n\u{FB01}eld";
        assert_eq!(
            normalize_text(text),
            "SECTION 01 33 00\nSUBMITTAL PROCEDURES - GENERAL\nfield"
        );
    }

    #[test]
    fn single_page_range_reads_only_that_page() {
        let bytes = four_page_pdf();
        let text = extract_page_range(&bytes, PageRange::new(2, 2).unwrap()).unwrap();
        assert!(text.contains("ALPHA"), "{}", text);
        assert!(!text.contains("Harbor"));
        assert!(!text.contains("BRAVO"));
    }

    #[test]
    fn range_past_the_end_keeps_remaining_pages() {
        let bytes = four_page_pdf();
        let text = extract_page_range(&bytes, PageRange::new(3, 10).unwrap()).unwrap();
        assert!(!text.contains("ALPHA"));
        assert!(text.find("BRAVO").unwrap() < text.find("CHARLIE").unwrap());

        let beyond = extract_page_range(&bytes, PageRange::new(9, 10).unwrap()).unwrap();
        assert!(beyond.trim().is_empty());
    }

    #[test]
    fn full_text_keeps_page_order() {
        let text = extract_full_text(&four_page_pdf()).unwrap();
        let positions: Vec<usize> = ["Harbor", "ALPHA", "BRAVO", "CHARLIE"]
            .iter()
            .map(|marker| text.find(marker).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", text);
    }

    #[test]
    fn garbage_bytes_are_an_error() {
        assert!(extract_full_text(b"definitely not a pdf").is_err());
    }
}
