//! Glossary term annotation.
//!
//! [`Annotator`] compiles whole-word, case-insensitive matchers for every
//! glossary key once and splits text into [`Segment`]s: plain runs and spans
//! bound to a glossary entry. Concatenating the segment texts always yields the
//! input unchanged.

use crate::glossary::{Glossary, GlossaryEntry};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How overlapping candidate terms are resolved.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// One left-to-right pass; the longest term wins at each position.
    #[default]
    #[serde(alias = "longest")]
    LongestAtPosition,
    /// One pass per term, longest term first, sharing a single cursor. Matches
    /// that start before the cursor are dropped, so a shorter term occurring
    /// before a longer term's match stays plain text.
    #[serde(alias = "priority")]
    TermPriority,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStrategy::LongestAtPosition => write!(f, "longest"),
            MatchStrategy::TermPriority => write!(f, "priority"),
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "longest" | "longest_at_position" => Ok(MatchStrategy::LongestAtPosition),
            "priority" | "term_priority" => Ok(MatchStrategy::TermPriority),
            other => Err(format!(
                "unknown strategy {other:?} (expected longest or priority)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment<'a> {
    Plain {
        text: &'a str,
    },
    Term {
        text: &'a str,
        entry: &'a GlossaryEntry,
    },
}

impl<'a> Segment<'a> {
    /// Literal text covered by this segment, in its original casing.
    pub fn text(&self) -> &'a str {
        match self {
            Segment::Plain { text } | Segment::Term { text, .. } => text,
        }
    }

    pub fn entry(&self) -> Option<&'a GlossaryEntry> {
        match self {
            Segment::Plain { .. } => None,
            Segment::Term { entry, .. } => Some(entry),
        }
    }

    pub fn is_term(&self) -> bool {
        matches!(self, Segment::Term { .. })
    }
}

/// Rebuilds the source text from its segments.
pub fn concat(segments: &[Segment<'_>]) -> String {
    segments.iter().map(Segment::text).collect()
}

/// Distinct entries referenced by `segments`, in order of first appearance.
pub fn terms_used<'a>(segments: &[Segment<'a>]) -> Vec<&'a GlossaryEntry> {
    let mut used: Vec<&'a GlossaryEntry> = Vec::new();
    for entry in segments.iter().filter_map(Segment::entry) {
        if !used.iter().any(|seen| std::ptr::eq(*seen, entry)) {
            used.push(entry);
        }
    }
    used
}

#[derive(Debug)]
pub enum AnnotateError {
    Pattern(regex::Error),
}

impl fmt::Display for AnnotateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotateError::Pattern(err) => write!(f, "failed to compile term matcher: {err}"),
        }
    }
}

impl std::error::Error for AnnotateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnnotateError::Pattern(err) => Some(err),
        }
    }
}

impl From<regex::Error> for AnnotateError {
    fn from(value: regex::Error) -> Self {
        AnnotateError::Pattern(value)
    }
}

enum Matcher {
    Empty,
    /// Alternation ordered longest first; capture group `i + 1` is entry `i`.
    Combined(Regex),
    PerTerm(Vec<Regex>),
}

pub struct Annotator {
    strategy: MatchStrategy,
    entries: Vec<GlossaryEntry>,
    matcher: Matcher,
}

impl Annotator {
    pub fn new(glossary: &Glossary) -> Result<Self, AnnotateError> {
        Self::with_strategy(glossary, MatchStrategy::default())
    }

    pub fn with_strategy(glossary: &Glossary, strategy: MatchStrategy) -> Result<Self, AnnotateError> {
        let terms = glossary.terms_longest_first();
        let entries: Vec<GlossaryEntry> = terms.iter().map(|(_, entry)| (*entry).clone()).collect();
        let matcher = if terms.is_empty() {
            Matcher::Empty
        } else {
            match strategy {
                MatchStrategy::LongestAtPosition => {
                    let alternation = terms
                        .iter()
                        .map(|(key, _)| format!("({})", regex::escape(key)))
                        .collect::<Vec<_>>()
                        .join("|");
                    Matcher::Combined(compile(&format!(r"\b(?:{alternation})\b"))?)
                }
                MatchStrategy::TermPriority => Matcher::PerTerm(
                    terms
                        .iter()
                        .map(|(key, _)| compile(&format!(r"\b{}\b", regex::escape(key))))
                        .collect::<Result<_, _>>()?,
                ),
            }
        };
        Ok(Self {
            strategy,
            entries,
            matcher,
        })
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Number of terms this annotator recognizes.
    pub fn term_count(&self) -> usize {
        self.entries.len()
    }

    pub fn annotate<'a>(&'a self, text: &'a str) -> Vec<Segment<'a>> {
        let mut emitter = Emitter::new(text);
        match &self.matcher {
            Matcher::Empty => {}
            Matcher::Combined(regex) => {
                for caps in regex.captures_iter(text) {
                    let Some(whole) = caps.get(0) else { continue };
                    let Some(idx) = (1..caps.len()).find(|&group| caps.get(group).is_some()) else {
                        continue;
                    };
                    emitter.accept(whole.start(), whole.end(), &self.entries[idx - 1]);
                }
            }
            Matcher::PerTerm(regexes) => {
                for (entry, regex) in self.entries.iter().zip(regexes) {
                    for found in regex.find_iter(text) {
                        emitter.accept(found.start(), found.end(), entry);
                    }
                }
            }
        }
        let segments = emitter.finish();
        debug!(
            strategy = %self.strategy,
            bytes = text.len(),
            segments = segments.len(),
            "annotated text"
        );
        segments
    }
}

impl fmt::Debug for Annotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Annotator")
            .field("strategy", &self.strategy)
            .field("terms", &self.entries.len())
            .finish()
    }
}

fn compile(pattern: &str) -> Result<Regex, AnnotateError> {
    Ok(RegexBuilder::new(pattern).case_insensitive(true).build()?)
}

struct Emitter<'a> {
    text: &'a str,
    cursor: usize,
    segments: Vec<Segment<'a>>,
}

impl<'a> Emitter<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            cursor: 0,
            segments: Vec::new(),
        }
    }

    fn accept(&mut self, start: usize, end: usize, entry: &'a GlossaryEntry) {
        if start < self.cursor {
            return;
        }
        if start > self.cursor {
            self.segments.push(Segment::Plain {
                text: &self.text[self.cursor..start],
            });
        }
        self.segments.push(Segment::Term {
            text: &self.text[start..end],
            entry,
        });
        self.cursor = end;
    }

    fn finish(mut self) -> Vec<Segment<'a>> {
        if self.segments.is_empty() {
            return vec![Segment::Plain { text: self.text }];
        }
        if self.cursor < self.text.len() {
            self.segments.push(Segment::Plain {
                text: &self.text[self.cursor..],
            });
        }
        self.segments
    }
}
