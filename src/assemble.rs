use std::fmt;

use crate::sections::extract::{self, SectionSpan};
use crate::sections::submittals::{self, CategoryOrder};
use crate::sections::{heading_for, SectionIdentifier};

/// How much of the special (submittal procedures) section is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpecialSectionScope {
    /// Only its submittal blocks, like every other section.
    #[default]
    Submittals,
    /// The whole bounded span, heading through `END OF SECTION`.
    Whole,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblyOptions {
    pub category_order: CategoryOrder,
    pub special_scope: SpecialSectionScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledSection {
    pub heading: String,
    pub title: String,
    pub body: String,
}

impl AssembledSection {
    /// `SECTION 01 33 00 - SUBMITTAL PROCEDURES`
    pub fn caption(&self) -> String {
        format!("{} - {}", self.heading, self.title)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledContent {
    pub sections: Vec<AssembledSection>,
}

impl AssembledContent {
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Heading/title captions only, in output order.
    pub fn table_of_contents(&self) -> Vec<String> {
        self.sections.iter().map(AssembledSection::caption).collect()
    }
}

impl fmt::Display for AssembledContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for section in &self.sections {
            write!(f, "{}\n{}\n\n", section.caption(), section.body)?;
        }
        Ok(())
    }
}

/// Build the assembled content from the full document text.
///
/// The special section goes first and is dropped from `identifiers`, so it
/// is never emitted twice. Sections without a bounded span or without any
/// submittal block are skipped.
pub fn assemble(
    full_text: &str,
    identifiers: &[SectionIdentifier],
    special_section: &str,
    options: AssemblyOptions,
) -> AssembledContent {
    let mut content = AssembledContent::default();

    let special_heading = heading_for(special_section);
    match extract::extract_section(full_text, &special_heading) {
        Some(span) => {
            let body = match options.special_scope {
                SpecialSectionScope::Whole => Some(span.body.clone()),
                SpecialSectionScope::Submittals => {
                    submittals::extract_submittals(&span.body, options.category_order)
                }
            };
            match body {
                Some(body) => content.sections.push(section_from(span, body)),
                None => tracing::debug!("Special section {} has no submittal blocks", special_section),
            }
        }
        None => tracing::debug!("Special section {} not found in document", special_section),
    }

    for identifier in identifiers.iter().filter(|i| i.token != special_section) {
        let heading = identifier.heading();
        let Some(span) = extract::extract_section(full_text, &heading) else {
            tracing::debug!("Skipping {}: heading not found", identifier.token);
            continue;
        };
        let Some(body) = submittals::extract_submittals(&span.body, options.category_order) else {
            tracing::debug!("Skipping {}: no submittal category matched", identifier.token);
            continue;
        };
        content.sections.push(section_from(span, body));
    }

    tracing::info!("Assembled {} sections", content.len());
    content
}

fn section_from(span: SectionSpan, body: String) -> AssembledSection {
    AssembledSection {
        heading: span.heading,
        title: span.title,
        body,
    }
}
