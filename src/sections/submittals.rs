use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Submittal sub-headings, in the priority order they are scanned.
pub const CATEGORIES: [&str; 4] = [
    "SUBMITTALS",
    "ACTION SUBMITTALS",
    "INFORMATION SUBMITTALS",
    "CLOSEOUT SUBMITTALS",
];

/// How blocks from several categories are ordered in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CategoryOrder {
    /// Order of [`CATEGORIES`], regardless of where each block sits in the section.
    #[default]
    Fixed,
    /// Order in which the blocks appear in the section text.
    Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittalBlock {
    pub category: &'static str,
    pub text: String,
    start: usize,
}

fn subsection_boundary() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[0-9]+\.[0-9]+").expect("boundary pattern is valid"))
}

/// Find a block for every category present in `section`.
///
/// A block starts at the beginning of the line holding the category label
/// and runs up to the next line that opens with a numbered subsection
/// (`1.2`, `2.10`, ...) or to the end of the section.
pub fn find_blocks(section: &str, order: CategoryOrder) -> Vec<SubmittalBlock> {
    let mut blocks: Vec<SubmittalBlock> = Vec::new();

    for category in CATEGORIES {
        let Some(label_at) = section.find(category) else {
            continue;
        };
        let start = section[..label_at].rfind('\n').map_or(0, |nl| nl + 1);
        let label_end = label_at + category.len();
        let end = subsection_boundary()
            .find(&section[label_end..])
            .map_or(section.len(), |m| label_end + m.start());

        // "SUBMITTALS" also matches inside "ACTION SUBMITTALS"; one block per start.
        if blocks.iter().any(|b| b.start == start) {
            tracing::debug!("{} resolves to an already captured block", category);
            continue;
        }

        blocks.push(SubmittalBlock {
            category,
            text: section[start..end].trim_end().to_string(),
            start,
        });
    }

    if order == CategoryOrder::Document {
        blocks.sort_by_key(|b| b.start);
    }
    blocks
}

/// All blocks of `section` joined by blank lines, or `None` if no category matched.
pub fn extract_submittals(section: &str, order: CategoryOrder) -> Option<String> {
    let blocks = find_blocks(section, order);
    if blocks.is_empty() {
        return None;
    }
    tracing::debug!(
        "Captured submittal blocks: {:?}",
        blocks.iter().map(|b| b.category).collect::<Vec<_>>()
    );
    Some(
        blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECTION: &str = "SECTION 08 11 13\nHOLLOW METAL DOORS\n\
        1.1 SUMMARY\nA. Section includes doors.\n\
        1.2 CLOSEOUT SUBMITTALS\nA. Maintenance data.\n\
        1.3 ACTION SUBMITTALS\nA. Product data.\nB. Shop drawings.\n\
        1.4 QUALITY ASSURANCE\nA. Installer qualifications.\nEND OF SECTION";

    #[test]
    fn block_stops_before_next_numbered_subsection() {
        let section = "1.1 ACTION SUBMITTALS\nA. Product data.\n1.2 QUALITY ASSURANCE\nB. Other.";
        let blocks = find_blocks(section, CategoryOrder::Fixed);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].category, "SUBMITTALS");
        assert_eq!(blocks[0].text, "1.1 ACTION SUBMITTALS\nA. Product data.");
        assert!(!blocks[0].text.contains("1.2"));
    }

    #[test]
    fn bare_label_claims_the_first_category_line() {
        let out = extract_submittals(SECTION, CategoryOrder::Fixed).unwrap();
        assert_eq!(
            out,
            "1.2 CLOSEOUT SUBMITTALS\nA. Maintenance data.\n\n\
             1.3 ACTION SUBMITTALS\nA. Product data.\nB. Shop drawings."
        );
        let cats: Vec<&str> = find_blocks(SECTION, CategoryOrder::Fixed)
            .iter()
            .map(|b| b.category)
            .collect();
        assert_eq!(cats, vec!["SUBMITTALS", "ACTION SUBMITTALS"]);
    }

    #[test]
    fn fixed_order_can_disagree_with_document_order() {
        let section = "1.1 SUBMITTALS\nA. Schedule.\n\
                       1.2 CLOSEOUT SUBMITTALS\nA. Warranty.\n\
                       1.3 ACTION SUBMITTALS\nA. Product data.\n\
                       1.4 QUALITY ASSURANCE";
        let texts = |order| -> Vec<String> {
            find_blocks(section, order).into_iter().map(|b| b.text).collect()
        };
        assert_eq!(
            texts(CategoryOrder::Fixed),
            vec![
                "1.1 SUBMITTALS\nA. Schedule.",
                "1.3 ACTION SUBMITTALS\nA. Product data.",
                "1.2 CLOSEOUT SUBMITTALS\nA. Warranty.",
            ]
        );
        assert_eq!(
            texts(CategoryOrder::Document),
            vec![
                "1.1 SUBMITTALS\nA. Schedule.",
                "1.2 CLOSEOUT SUBMITTALS\nA. Warranty.",
                "1.3 ACTION SUBMITTALS\nA. Product data.",
            ]
        );
    }

    #[test]
    fn no_category_means_none() {
        assert_eq!(extract_submittals("1.1 SUMMARY\nA. Nothing to submit.", CategoryOrder::Fixed), None);
    }

    #[test]
    fn block_runs_to_end_without_boundary() {
        let blocks = find_blocks("CLOSEOUT SUBMITTALS\nA. Record drawings.\n", CategoryOrder::Fixed);
        assert_eq!(blocks[0].text, "CLOSEOUT SUBMITTALS\nA. Record drawings.");
    }
}
