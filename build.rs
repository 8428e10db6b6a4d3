use std::collections::HashSet;
use std::env;
use std::error::Error;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

fn main() -> Result<(), Box<dyn Error>> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);

    let glossary = load_glossary(&manifest_dir)?;
    let site = load_site(&manifest_dir)?;
    validate_glossary(&glossary)?;
    validate_sections(&site.sections)?;

    let content_path = out_dir.join("content.rs");
    fs::write(&content_path, generate_content(&glossary, &site)?)?;
    println!("cargo:rustc-env=MANIFESTO_CONTENT={}", content_path.display());
    Ok(())
}

#[derive(Debug, Deserialize)]
struct GlossaryJson {
    term: String,
    definition: String,
}

#[derive(Debug, Deserialize)]
struct SiteJson {
    title: String,
    outline_heading: String,
    footer: String,
    sections: Vec<SectionJson>,
}

#[derive(Debug, Deserialize)]
struct SectionJson {
    id: String,
    title: String,
    summary: String,
    full_text: String,
}

fn data_file(manifest_dir: &Path, name: &str) -> Result<String, Box<dyn Error>> {
    let path = manifest_dir.join("data").join(name);
    println!("cargo:rerun-if-changed={}", path.display());
    if !path.exists() {
        panic!("Missing {}. Content files live under data/.", path.display());
    }
    Ok(fs::read_to_string(&path)?)
}

fn load_glossary(manifest_dir: &Path) -> Result<Vec<GlossaryJson>, Box<dyn Error>> {
    let raw = data_file(manifest_dir, "glossary.json")?;
    serde_json::from_str(&raw).map_err(|err| format!("Failed to parse glossary.json: {err}").into())
}

fn load_site(manifest_dir: &Path) -> Result<SiteJson, Box<dyn Error>> {
    let raw = data_file(manifest_dir, "sections.json")?;
    serde_json::from_str(&raw).map_err(|err| format!("Failed to parse sections.json: {err}").into())
}

fn validate_glossary(entries: &[GlossaryJson]) -> Result<(), Box<dyn Error>> {
    let mut seen = HashSet::new();
    for (idx, entry) in entries.iter().enumerate() {
        let key = entry.term.trim().to_lowercase();
        if key.is_empty() {
            return Err(format!("Glossary entry {idx} has an empty term").into());
        }
        if entry.definition.trim().is_empty() {
            return Err(format!("Glossary term {:?} has no definition", entry.term).into());
        }
        if !seen.insert(key.clone()) {
            return Err(format!("Duplicate glossary term {key:?}").into());
        }
    }
    Ok(())
}

fn validate_sections(sections: &[SectionJson]) -> Result<(), Box<dyn Error>> {
    if sections.is_empty() {
        return Err("sections.json must contain at least one section".into());
    }
    let mut seen = HashSet::new();
    for section in sections {
        if section.id.trim().is_empty() || section.id.contains(char::is_whitespace) {
            return Err(format!("Section id {:?} is not a usable anchor", section.id).into());
        }
        if !seen.insert(section.id.as_str()) {
            return Err(format!("Duplicate section id {:?}", section.id).into());
        }
    }
    Ok(())
}

// `{:?}` on a str yields a valid Rust string literal.
fn generate_content(glossary: &[GlossaryJson], site: &SiteJson) -> Result<String, Box<dyn Error>> {
    let mut out = String::new();
    writeln!(out, "// Generated by build.rs from data/*.json.")?;
    writeln!(out, "pub static SITE_TITLE: &str = {:?};", site.title)?;
    writeln!(out, "pub static OUTLINE_HEADING: &str = {:?};", site.outline_heading)?;
    writeln!(out, "pub static FOOTER: &str = {:?};", site.footer)?;
    writeln!(out, "pub static GLOSSARY_TABLE: &[RawEntry] = &[")?;
    for entry in glossary {
        writeln!(
            out,
            "    RawEntry {{ term: {:?}, definition: {:?} }},",
            entry.term, entry.definition
        )?;
    }
    writeln!(out, "];")?;
    writeln!(out, "pub static SECTION_TABLE: &[RawSection] = &[")?;
    for section in &site.sections {
        writeln!(
            out,
            "    RawSection {{ id: {:?}, title: {:?}, summary: {:?}, full_text: {:?} }},",
            section.id, section.title, section.summary, section.full_text
        )?;
    }
    writeln!(out, "];")?;
    Ok(out)
}
