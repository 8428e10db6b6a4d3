use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A known phrase with its display label and definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
}

impl GlossaryEntry {
    pub fn new(term: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            definition: definition.into(),
        }
    }

    /// Normalized lookup key for this entry.
    pub fn key(&self) -> String {
        normalize_term(&self.term)
    }
}

/// Lower-cases and trims a term so lookups ignore casing.
pub fn normalize_term(term: &str) -> String {
    term.trim().to_lowercase()
}

#[derive(Debug)]
pub enum GlossaryError {
    EmptyTerm,
    DuplicateTerm { key: String },
    #[cfg(feature = "serde_json")]
    Parse(serde_json::Error),
}

impl fmt::Display for GlossaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlossaryError::EmptyTerm => write!(f, "glossary term cannot be empty"),
            GlossaryError::DuplicateTerm { key } => {
                write!(f, "duplicate glossary term {key:?}")
            }
            #[cfg(feature = "serde_json")]
            GlossaryError::Parse(err) => write!(f, "invalid glossary json: {err}"),
        }
    }
}

impl std::error::Error for GlossaryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "serde_json")]
            GlossaryError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(feature = "serde_json")]
impl From<serde_json::Error> for GlossaryError {
    fn from(value: serde_json::Error) -> Self {
        GlossaryError::Parse(value)
    }
}

/// Case-insensitive term table. Keys are unique after normalization.
#[derive(Debug, Clone, Default)]
pub struct Glossary {
    entries: BTreeMap<String, GlossaryEntry>,
}

impl Glossary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Result<Self, GlossaryError>
    where
        I: IntoIterator<Item = GlossaryEntry>,
    {
        let mut map = BTreeMap::new();
        for entry in entries {
            let key = entry.key();
            if key.is_empty() {
                return Err(GlossaryError::EmptyTerm);
            }
            if map.contains_key(&key) {
                return Err(GlossaryError::DuplicateTerm { key });
            }
            map.insert(key, entry);
        }
        Ok(Self { entries: map })
    }

    /// Parses a JSON array of `{ "term", "definition" }` objects.
    #[cfg(feature = "serde_json")]
    pub fn from_json(raw: &str) -> Result<Self, GlossaryError> {
        let entries: Vec<GlossaryEntry> = serde_json::from_str(raw)?;
        Self::from_entries(entries)
    }

    pub fn get(&self, term: &str) -> Option<&GlossaryEntry> {
        self.entries.get(&normalize_term(term))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &GlossaryEntry)> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.as_str(), entry))
    }

    /// Keys ordered longest first, ties broken by key order.
    pub fn terms_longest_first(&self) -> Vec<(&str, &GlossaryEntry)> {
        let mut terms: Vec<_> = self.iter().collect();
        // Stable sort keeps the BTreeMap key order among equal lengths.
        terms.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        terms
    }
}
