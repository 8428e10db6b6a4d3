use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use analogies28::annotate::{self, Segment};
use analogies28::events::EventHub;
use analogies28::scroll::parse_anchors;
use analogies28::{
    Annotator, Glossary, GlossaryEntry, Manifesto, MatchStrategy, ScrollEvent, ScrollMetrics,
};
use atty::Stream;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use termimad::{FmtText, MadSkin, terminal_size};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "analogies28",
    about = "Browse and annotate the Analogies 28 manifesto",
    version
)]
pub struct Cli {
    /// Emit JSON instead of human-readable output.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect the built-in glossary.
    #[command(subcommand)]
    Glossary(GlossaryCommand),
    /// Inspect manifesto sections.
    #[command(subcommand)]
    Section(SectionCommand),
    /// Annotate text with glossary terms.
    Annotate {
        /// Text to annotate. Reads stdin when neither TEXT nor --file is given.
        #[arg(conflicts_with = "file")]
        text: Option<String>,
        /// Read the text from a file.
        #[arg(long)]
        file: Option<PathBuf>,
        /// JSON glossary (`[{"term": .., "definition": ..}]`) replacing the built-in one.
        #[arg(long)]
        glossary: Option<PathBuf>,
        /// How overlapping terms are resolved.
        #[arg(long, value_enum, default_value_t = StrategyArg::Longest)]
        strategy: StrategyArg,
    },
    /// Replay scroll offsets against the section layout and report the active section.
    Track {
        /// Viewport height in pixels.
        #[arg(long, default_value_t = 900.0)]
        viewport: f64,
        /// Comma-separated anchor tops, one per section; leave an item empty for a missing anchor.
        #[arg(long)]
        anchors: String,
        /// Scroll offsets to replay, in order.
        #[arg(required = true, allow_negative_numbers = true)]
        offsets: Vec<f64>,
    },
    /// Write the manifesto page to a static HTML file.
    #[cfg(feature = "web")]
    Render {
        /// Output path.
        #[arg(short, long)]
        out: PathBuf,
        /// Page theme (tailwind or bootstrap).
        #[arg(long, default_value = "tailwind")]
        theme: analogies28::web::WebTheme,
        /// Canonical URL of the page.
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        base_url: String,
        /// Section highlighted in the sidebar.
        #[arg(long)]
        section: Option<String>,
    },
    /// Serve the manifesto over HTTP.
    #[cfg(feature = "web")]
    Serve {
        /// Socket address to bind.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: std::net::SocketAddr,
        /// Page theme (tailwind or bootstrap).
        #[arg(long, default_value = "tailwind")]
        theme: analogies28::web::WebTheme,
        /// Public base URL used for canonical links.
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        base_url: String,
    },
}

#[derive(Subcommand, Debug)]
enum GlossaryCommand {
    /// List every glossary term.
    List,
    /// Show one term (case-insensitive).
    Show {
        /// Term to look up.
        term: String,
    },
}

#[derive(Subcommand, Debug)]
enum SectionCommand {
    /// List sections in document order.
    List,
    /// Show a section with its glossary terms highlighted.
    Show {
        /// Section id, e.g. `equity`.
        id: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Single left-to-right pass, longest term wins at each position.
    Longest,
    /// One pass per term, longest term first.
    Priority,
}

impl From<StrategyArg> for MatchStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Longest => MatchStrategy::LongestAtPosition,
            StrategyArg::Priority => MatchStrategy::TermPriority,
        }
    }
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.command);
    match cli.command {
        Command::Glossary(GlossaryCommand::List) => handle_glossary_list(cli.json),
        Command::Glossary(GlossaryCommand::Show { term }) => handle_glossary_show(term, cli.json),
        Command::Section(SectionCommand::List) => handle_section_list(cli.json),
        Command::Section(SectionCommand::Show { id }) => handle_section_show(id, cli.json),
        Command::Annotate {
            text,
            file,
            glossary,
            strategy,
        } => handle_annotate(text, file, glossary, strategy.into(), cli.json),
        Command::Track {
            viewport,
            anchors,
            offsets,
        } => handle_track(viewport, &anchors, &offsets, cli.json),
        #[cfg(feature = "web")]
        Command::Render {
            out,
            theme,
            base_url,
            section,
        } => handle_render(out, theme, &base_url, section.as_deref()),
        #[cfg(feature = "web")]
        Command::Serve {
            addr,
            theme,
            base_url,
        } => handle_serve(addr, theme, base_url),
    }
}

fn init_tracing(command: &Command) {
    let default_level = match command {
        #[cfg(feature = "web")]
        Command::Serve { .. } => "info",
        _ => "warn",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn handle_glossary_list(as_json: bool) -> Result<(), Box<dyn Error>> {
    let glossary = Manifesto::glossary();
    if as_json {
        let payload: Vec<_> = glossary
            .iter()
            .map(|(key, entry)| {
                json!({ "key": key, "term": entry.term, "definition": entry.definition })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_glossary_table(glossary);
    }
    Ok(())
}

fn handle_glossary_show(term: String, as_json: bool) -> Result<(), Box<dyn Error>> {
    let entry = Manifesto::glossary()
        .get(&term)
        .ok_or_else(|| format!("No glossary entry for {term:?}"))?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(entry)?);
    } else {
        println!("{}", entry.term);
        println!("{}", entry.definition);
    }
    Ok(())
}

fn handle_section_list(as_json: bool) -> Result<(), Box<dyn Error>> {
    let rows: Vec<(&str, &str, usize)> = Manifesto::sections()
        .iter()
        .map(|section| {
            let mut segments = Manifesto::annotate(&section.full_text);
            segments.extend(Manifesto::annotate(&section.summary));
            (
                section.id.as_str(),
                section.title.as_str(),
                annotate::terms_used(&segments).len(),
            )
        })
        .collect();

    if as_json {
        let payload: Vec<_> = rows
            .iter()
            .map(|(id, title, terms)| json!({ "id": id, "title": title, "terms": terms }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_section_table(&rows);
    }
    Ok(())
}

fn handle_section_show(id: String, as_json: bool) -> Result<(), Box<dyn Error>> {
    let section = Manifesto::section(&id).ok_or_else(|| format!("No section with id {id:?}"))?;
    let summary = Manifesto::annotate(&section.summary);
    let full_text = Manifesto::annotate(&section.full_text);

    if as_json {
        let payload = json!({
            "id": section.id,
            "title": section.title,
            "summary": summary,
            "full_text": full_text,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    println!("{} ({})", section.title, section.id);
    render_segments("Summary", &summary);
    render_segments("Full Text", &full_text);
    let mut all = summary;
    all.extend(full_text);
    print_terms(&annotate::terms_used(&all));
    Ok(())
}

fn handle_annotate(
    text: Option<String>,
    file: Option<PathBuf>,
    glossary: Option<PathBuf>,
    strategy: MatchStrategy,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let input = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => fs::read_to_string(&path)
            .map_err(|err| format!("Failed to read {}: {err}", path.display()))?,
        (None, None) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };
    let custom = glossary
        .map(|path| -> Result<Glossary, Box<dyn Error>> {
            let raw = fs::read_to_string(&path)
                .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
            Ok(Glossary::from_json(&raw)?)
        })
        .transpose()?;
    let annotator = Annotator::with_strategy(custom.as_ref().unwrap_or(Manifesto::glossary()), strategy)?;
    debug!(terms = annotator.term_count(), %strategy, "annotator ready");
    let segments = annotator.annotate(&input);

    if as_json {
        let payload = json!({
            "strategy": strategy,
            "segments": segments,
            "terms": annotate::terms_used(&segments),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        render_segments("Annotated", &segments);
        print_terms(&annotate::terms_used(&segments));
    }
    Ok(())
}

fn handle_track(
    viewport: f64,
    anchors: &str,
    offsets: &[f64],
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let anchors = parse_anchors(anchors)?;
    let hub = EventHub::new();
    let page = Manifesto::controller().mount(&hub)?;
    let mut rows = Vec::with_capacity(offsets.len());
    for &offset in offsets {
        let event = ScrollEvent {
            metrics: ScrollMetrics::new(offset, viewport),
            anchors: anchors.clone(),
        };
        hub.emit(&event)?;
        rows.push((offset, event.metrics.probe(), page.active_id()));
    }
    page.unmount();

    if as_json {
        let payload: Vec<_> = rows
            .iter()
            .map(|(offset, probe, active)| {
                json!({ "offset": offset, "probe": probe, "active": active })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_track_table(&rows);
    }
    Ok(())
}

#[cfg(feature = "web")]
fn handle_render(
    out: PathBuf,
    theme: analogies28::web::WebTheme,
    base_url: &str,
    section: Option<&str>,
) -> Result<(), Box<dyn Error>> {
    let html = analogies28::web::render_page(theme, base_url, section)?;
    fs::write(&out, html)?;
    tracing::info!(path = %out.display(), %theme, "wrote manifesto page");
    println!("Wrote {}", out.display());
    Ok(())
}

#[cfg(feature = "web")]
fn handle_serve(
    addr: std::net::SocketAddr,
    theme: analogies28::web::WebTheme,
    base_url: String,
) -> Result<(), Box<dyn Error>> {
    let config = analogies28::web::WebConfig {
        addr,
        theme,
        base_url,
    };
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(analogies28::web::serve(config))?;
    Ok(())
}

fn print_glossary_table(glossary: &Glossary) {
    if glossary.is_empty() {
        println!("The glossary is empty.");
        return;
    }
    let width = glossary
        .iter()
        .map(|(_, entry)| entry.term.len())
        .max()
        .unwrap_or(4)
        .max("TERM".len());
    println!("{:<width$}  {}", "TERM", "DEFINITION", width = width);
    println!("{:-<width$}  {}", "", "----------", width = width);
    for (_, entry) in glossary.iter() {
        println!("{:<width$}  {}", entry.term, entry.definition, width = width);
    }
}

fn print_section_table(rows: &[(&str, &str, usize)]) {
    let id_width = rows
        .iter()
        .map(|(id, _, _)| id.len())
        .max()
        .unwrap_or(2)
        .max("ID".len());
    let title_width = rows
        .iter()
        .map(|(_, title, _)| title.len())
        .max()
        .unwrap_or(5)
        .max("TITLE".len());
    println!(
        "{:<id_width$}  {:<title_width$}  {}",
        "ID", "TITLE", "TERMS",
        id_width = id_width,
        title_width = title_width
    );
    println!(
        "{:-<id_width$}  {:-<title_width$}  {}",
        "", "", "-----",
        id_width = id_width,
        title_width = title_width
    );
    for (id, title, terms) in rows {
        println!(
            "{:<id_width$}  {:<title_width$}  {}",
            id, title, terms,
            id_width = id_width,
            title_width = title_width
        );
    }
}

fn print_track_table(rows: &[(f64, f64, Option<String>)]) {
    println!("{:>10}  {:>10}  {}", "OFFSET", "PROBE", "ACTIVE");
    println!("{:->10}  {:->10}  {}", "", "", "------");
    for (offset, probe, active) in rows {
        println!(
            "{:>10}  {:>10}  {}",
            offset,
            probe,
            active.as_deref().unwrap_or("<none>")
        );
    }
}

fn print_terms(entries: &[&GlossaryEntry]) {
    if entries.is_empty() {
        println!("\nNo glossary terms found.");
        return;
    }
    println!("\nTerms:");
    for entry in entries {
        println!("- {}: {}", entry.term, entry.definition);
    }
}

/// Markdown with annotated spans in bold, for the termimad renderer.
fn segments_markdown(segments: &[Segment<'_>]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Plain { text } => escape_markdown(text),
            Segment::Term { text, .. } => format!("**{}**", escape_markdown(text)),
        })
        .collect()
}

fn escape_markdown(text: &str) -> String {
    text.replace('\\', r"\\")
        .replace('*', r"\*")
        .replace('_', r"\_")
}

/// The input text verbatim with `**` around each annotated span.
fn segments_plain(segments: &[Segment<'_>]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Plain { text } => (*text).to_string(),
            Segment::Term { text, .. } => format!("**{text}**"),
        })
        .collect()
}

fn stdout_is_tty() -> bool {
    atty::is(Stream::Stdout)
}

fn markdown_width() -> usize {
    let (width, _) = terminal_size();
    width.max(60) as usize
}

fn markdown_skin() -> MadSkin {
    MadSkin::default()
}

fn render_segments(title: &str, segments: &[Segment<'_>]) {
    if segments.iter().all(|segment| segment.text().trim().is_empty()) {
        return;
    }
    println!("\n{title}:");
    if stdout_is_tty() {
        let markdown = segments_markdown(segments);
        let skin = markdown_skin();
        let formatted = FmtText::from(&skin, markdown.trim(), Some(markdown_width()));
        println!("{formatted}");
    } else {
        println!("{}", segments_plain(segments).trim_end_matches('\n'));
    }
}
