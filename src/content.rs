//! Compiled-in manifesto content, generated by `build.rs` from `data/*.json`.

#[derive(Debug, Clone, Copy)]
pub struct RawEntry {
    pub term: &'static str,
    pub definition: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct RawSection {
    pub id: &'static str,
    pub title: &'static str,
    pub summary: &'static str,
    pub full_text: &'static str,
}

include!(env!("MANIFESTO_CONTENT"));
