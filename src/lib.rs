pub mod annotate;
mod content;
pub mod events;
pub mod glossary;
pub mod page;
pub mod scroll;
#[cfg(feature = "web")]
pub mod web;

pub use annotate::{AnnotateError, Annotator, MatchStrategy, Segment};
pub use glossary::{Glossary, GlossaryEntry, GlossaryError};
pub use page::{PageController, PageSnapshot, ScrollEvent};
pub use scroll::{ScrollMetrics, ScrollTracker};

use once_cell::sync::Lazy;
use serde::Serialize;

static GLOSSARY: Lazy<Glossary> = Lazy::new(|| {
    Glossary::from_entries(
        content::GLOSSARY_TABLE
            .iter()
            .map(|raw| GlossaryEntry::new(raw.term, raw.definition)),
    )
    .expect("glossary validated by build.rs")
});
static ANNOTATOR: Lazy<Annotator> =
    Lazy::new(|| Annotator::new(&GLOSSARY).expect("built-in glossary compiles"));
static SECTIONS: Lazy<Vec<Section>> = Lazy::new(|| {
    content::SECTION_TABLE
        .iter()
        .map(|raw| Section {
            id: raw.id.to_string(),
            title: raw.title.to_string(),
            summary: raw.summary.to_string(),
            full_text: raw.full_text.to_string(),
        })
        .collect()
});

/// One titled unit of the manifesto, addressed by its anchor id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub full_text: String,
}

/// Read-only access to the compiled-in manifesto.
pub struct Manifesto;

impl Manifesto {
    pub fn site_title() -> &'static str {
        content::SITE_TITLE
    }

    pub fn outline_heading() -> &'static str {
        content::OUTLINE_HEADING
    }

    pub fn footer() -> &'static str {
        content::FOOTER
    }

    /// Sections in document order.
    pub fn sections() -> &'static [Section] {
        SECTIONS.as_slice()
    }

    pub fn section(id: &str) -> Option<&'static Section> {
        SECTIONS.iter().find(|section| section.id == id)
    }

    pub fn glossary() -> &'static Glossary {
        &GLOSSARY
    }

    /// Annotator over the built-in glossary, compiled on first use.
    pub fn annotator() -> &'static Annotator {
        &ANNOTATOR
    }

    pub fn annotate(text: &str) -> Vec<Segment<'_>> {
        // The annotator is 'static, so segments borrow only from `text`.
        ANNOTATOR.annotate(text)
    }

    /// Page controller over the manifesto sections, first section active.
    pub fn controller() -> PageController {
        PageController::new(Self::sections())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ships_six_sections_in_order() {
        let ids: Vec<_> = Manifesto::sections().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["introduction", "equity", "environment", "education", "democracy", "community"]
        );
        assert_eq!(Manifesto::section("democracy").unwrap().title, "Democratic Renewal");
        assert!(Manifesto::section("missing").is_none());
    }

    #[test]
    fn ships_nine_glossary_terms() {
        let glossary = Manifesto::glossary();
        assert_eq!(glossary.len(), 9);
        assert_eq!(
            glossary.get("RANKED-CHOICE VOTING").unwrap().term,
            "Ranked-Choice Voting"
        );
    }

    #[test]
    fn every_section_round_trips_through_the_annotator() {
        for section in Manifesto::sections() {
            for text in [&section.summary, &section.full_text] {
                let segments = Manifesto::annotate(text);
                assert_eq!(&annotate::concat(&segments), text);
            }
        }
    }

    #[test]
    fn community_section_annotates_its_terms() {
        let section = Manifesto::section("community").unwrap();
        let segments = Manifesto::annotate(&section.full_text);
        let used: Vec<_> = annotate::terms_used(&segments)
            .into_iter()
            .map(|entry| entry.term.as_str())
            .collect();
        assert_eq!(used, vec!["Social Infrastructure", "Mutual Aid"]);
    }

    #[test]
    fn controller_starts_on_introduction() {
        assert_eq!(Manifesto::controller().active_id(), Some("introduction"));
    }
}
