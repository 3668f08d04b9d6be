use thiserror::Error;

/// Missing or malformed user input. The CLI treats these as a no-op:
/// the action is skipped and nothing is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("no PDF file was provided")]
    MissingPdf,
    #[error("project name is empty")]
    MissingProjectName,
    #[error("special section number is empty")]
    MissingSpecialSection,
    #[error("invalid TOC page range {start}..={end} (pages start at 1 and start must not exceed end)")]
    InvalidPageRange { start: usize, end: usize },
    #[error("no section numbers found on TOC pages {start}..={end}")]
    NoSectionNumbers { start: usize, end: usize },
}
