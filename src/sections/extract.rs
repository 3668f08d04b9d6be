use regex::Regex;

pub const END_OF_SECTION: &str = "END OF SECTION";
pub const UNKNOWN_TITLE: &str = "Unknown";

/// Text of one section, from its heading through `END OF SECTION`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSpan {
    pub heading: String,
    pub title: String,
    pub body: String,
}

/// Find the first `heading ... END OF SECTION` span in `text`.
///
/// Matching is case-sensitive and non-greedy, so the span ends at the first
/// terminator after the heading. A heading without a terminator after it
/// yields `None`, the same as a heading that is absent.
pub fn extract_section(text: &str, heading: &str) -> Option<SectionSpan> {
    let escaped = regex::escape(heading);
    let span_re = Regex::new(&format!(r"(?s){}\s+.*?{}", escaped, END_OF_SECTION)).ok()?;

    let Some(found) = span_re.find(text) else {
        tracing::debug!("No bounded span for heading {:?}", heading);
        return None;
    };
    let body = found.as_str();

    Some(SectionSpan {
        heading: heading.to_string(),
        title: extract_title(body, heading),
        body: body.to_string(),
    })
}

/// Text following the heading up to the end of its line; whitespace
/// (including line breaks) directly after the heading is skipped.
pub fn extract_title(span: &str, heading: &str) -> String {
    let title_re = match Regex::new(&format!(r"{}\s+(.*?)\n", regex::escape(heading))) {
        Ok(re) => re,
        Err(_) => return UNKNOWN_TITLE.to_string(),
    };
    title_re
        .captures(span)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string())
}
