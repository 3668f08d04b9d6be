pub mod extract;
pub mod submittals;

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Numbering shapes, longest first. Alternation is leftmost-first, so at a
/// given position an earlier shape wins over a later one.
const SECTION_NUMBER_PATTERN: &str = concat!(
    r"\b[0-9]{2} [0-9]{2} [0-9]{2}\b|\b[0-9]{6}\b|\b[0-9]{3} [0-9]{3}\b|\b[0-9]{2} [0-9]{4}\b|",
    r"\b[0-9]{5}\b|\b[0-9]{2} [0-9]{3}\b|\b[0-9]{3} [0-9]{2}\b|",
    r"\b[0-9]{4}\b|\b[0-9]{2} [0-9]{2}\b|",
    r"\b[0-9]{3}\b",
);

fn section_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SECTION_NUMBER_PATTERN).expect("section number pattern is valid"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Matched one of the numbering shapes directly.
    Mined,
    /// A `<number>.NN` suffix found for a mined number.
    Addendum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionIdentifier {
    pub token: String,
    pub origin: Origin,
}

impl SectionIdentifier {
    pub fn heading(&self) -> String {
        heading_for(&self.token)
    }
}

/// `SECTION <number>`, the heading every section starts with.
pub fn heading_for(token: &str) -> String {
    format!("SECTION {}", token)
}

/// Every token matching a numbering shape, de-duplicated in first-seen order.
pub fn mine_section_numbers(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    section_number_regex()
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|token| seen.insert(*token))
        .map(str::to_string)
        .collect()
}

/// `<number>.NN` tokens for each mined number, in discovery order (grouped
/// by the number they extend). May contain repeats; see [`collect_identifiers`].
pub fn find_addenda(text: &str, numbers: &[String]) -> Vec<String> {
    let mut addenda = Vec::new();
    for number in numbers {
        let pattern = format!(r"{}\.[0-9]{{2}}", regex::escape(number));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => {
                tracing::warn!("Skipping addenda for {}: {}", number, e);
                continue;
            }
        };
        addenda.extend(re.find_iter(text).map(|m| m.as_str().to_string()));
    }
    addenda
}

/// Mined numbers followed by any addenda not already present.
/// Tokens are unique in the result.
pub fn collect_identifiers(text: &str) -> Vec<SectionIdentifier> {
    let mined = mine_section_numbers(text);
    let addenda = find_addenda(text, &mined);

    let mut seen: HashSet<String> = mined.iter().cloned().collect();
    let mut identifiers: Vec<SectionIdentifier> = mined
        .into_iter()
        .map(|token| SectionIdentifier { token, origin: Origin::Mined })
        .collect();

    for token in addenda {
        if seen.insert(token.clone()) {
            identifiers.push(SectionIdentifier { token, origin: Origin::Addendum });
        }
    }

    tracing::info!(
        "Mined {} section identifiers ({} addenda)",
        identifiers.len(),
        identifiers.iter().filter(|i| i.origin == Origin::Addendum).count()
    );
    identifiers
}
