use crate::annotate::{self, AnnotateError, Annotator, MatchStrategy, Segment};
use crate::page::{PageController, SidebarItem, TOOLTIP_GAP_PX};
use crate::scroll::{PROBE_DIVISOR, ScrollMetrics, parse_anchors};
use crate::{Manifesto, Section, ScrollEvent};
use askama::Html as HtmlEscaper;
use askama::{MarkupDisplay, Template};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

type SharedState = Arc<AppState>;
const MAX_ANNOTATE_BYTES: usize = 64 * 1024;
type SafeJson = MarkupDisplay<HtmlEscaper, String>;

pub struct AppState {
    pub theme: WebTheme,
    pub base_url: String,
    priority_annotator: Annotator,
}

impl AppState {
    pub fn new(theme: WebTheme, base_url: impl Into<String>) -> Result<Self, WebError> {
        Ok(Self {
            theme,
            base_url: base_url.into(),
            priority_annotator: Annotator::with_strategy(
                Manifesto::glossary(),
                MatchStrategy::TermPriority,
            )?,
        })
    }

    fn annotator(&self, strategy: MatchStrategy) -> &Annotator {
        match strategy {
            MatchStrategy::LongestAtPosition => Manifesto::annotator(),
            MatchStrategy::TermPriority => &self.priority_annotator,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum WebTheme {
    #[default]
    Tailwind,
    Bootstrap,
}

impl fmt::Display for WebTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebTheme::Tailwind => write!(f, "tailwind"),
            WebTheme::Bootstrap => write!(f, "bootstrap"),
        }
    }
}

impl FromStr for WebTheme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "tailwind" => Ok(WebTheme::Tailwind),
            "bootstrap" => Ok(WebTheme::Bootstrap),
            other => Err(format!("unknown theme {other:?} (expected tailwind or bootstrap)")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Chrome {
    use_tailwind: bool,
    use_bootstrap: bool,
    body_class: &'static str,
    header_class: &'static str,
    brand_class: &'static str,
    nav_class: &'static str,
    outline_heading_class: &'static str,
    nav_item_class: &'static str,
    nav_active_class: &'static str,
    nav_idle_class: &'static str,
    main_class: &'static str,
    grid_class: &'static str,
    section_title_class: &'static str,
    column_heading_class: &'static str,
    full_text_class: &'static str,
    summary_card_class: &'static str,
    summary_text_class: &'static str,
    footer_class: &'static str,
    term_class: &'static str,
    tooltip_class: &'static str,
    headline_class: &'static str,
    lede_class: &'static str,
    button_class: &'static str,
}

impl Chrome {
    fn new(theme: WebTheme) -> Self {
        match theme {
            WebTheme::Tailwind => Self {
                use_tailwind: true,
                use_bootstrap: false,
                body_class: "min-h-screen bg-gradient-to-br from-pink-100 via-purple-50 to-blue-100",
                header_class: "fixed top-0 left-0 right-0 z-40 px-8 py-6",
                brand_class: "text-2xl font-bold text-black tracking-tight",
                nav_class: "fixed left-0 top-20 bottom-0 w-80 overflow-y-auto z-30 p-6",
                outline_heading_class: "text-lg font-semibold text-black mb-6",
                nav_item_class: "block w-full text-left p-3 rounded-lg transition-all duration-200 font-medium text-black",
                nav_active_class: "border-2 border-blue-300 shadow-lg shadow-blue-200/50 font-bold",
                nav_idle_class: "hover:bg-black/10",
                main_class: "ml-80 pt-32 pb-16 max-w-7xl px-8",
                grid_class: "grid grid-cols-1 lg:grid-cols-2 gap-12 mb-20",
                section_title_class: "text-3xl font-bold text-black mb-6 pb-3 border-b-2 border-black/20",
                column_heading_class: "text-lg font-semibold text-black mb-6",
                full_text_class: "text-black leading-relaxed text-base tracking-wide",
                summary_card_class: "sticky top-32 bg-white/20 backdrop-blur-sm rounded-xl p-8 shadow-lg shadow-blue-200/50 border-2 border-blue-300",
                summary_text_class: "text-black leading-relaxed text-lg",
                footer_class: "ml-80 px-8 py-8 text-black text-center",
                term_class: "text-blue-600 underline hover:text-blue-800 transition-colors cursor-help",
                tooltip_class: "bg-white rounded-lg shadow-lg border border-gray-200 p-3 max-w-xs text-sm",
                headline_class: "text-4xl font-extrabold tracking-tight",
                lede_class: "text-lg text-slate-600",
                button_class: "inline-flex items-center rounded-md bg-slate-900 px-4 py-2 text-white font-semibold shadow hover:bg-slate-800 transition-colors",
            },
            WebTheme::Bootstrap => Self {
                use_tailwind: false,
                use_bootstrap: true,
                body_class: "bg-light text-dark",
                header_class: "fixed-top bg-light px-4 py-3 border-bottom",
                brand_class: "h4 fw-bold mb-0",
                nav_class: "position-fixed start-0 bottom-0 overflow-auto p-4 manifesto-sidebar",
                outline_heading_class: "h6 fw-semibold mb-4",
                nav_item_class: "btn w-100 text-start mb-2",
                nav_active_class: "btn-outline-primary fw-bold shadow",
                nav_idle_class: "btn-light",
                main_class: "container-fluid manifesto-main pb-5",
                grid_class: "row g-5 mb-5",
                section_title_class: "display-6 fw-bold border-bottom pb-2 mb-4",
                column_heading_class: "h6 fw-semibold mb-3",
                full_text_class: "lh-lg",
                summary_card_class: "card card-body shadow-sm border-primary sticky-top manifesto-summary",
                summary_text_class: "lead mb-0",
                footer_class: "manifesto-main text-center py-4",
                term_class: "text-primary text-decoration-underline",
                tooltip_class: "card card-body shadow p-2 small",
                headline_class: "display-5 fw-bold",
                lede_class: "lead mb-4",
                button_class: "btn btn-primary btn-lg px-4 py-2",
            },
        }
    }
}

#[derive(Clone)]
pub struct WebConfig {
    pub addr: SocketAddr,
    pub theme: WebTheme,
    pub base_url: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            theme: WebTheme::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum WebError {
    Io(std::io::Error),
    Render(askama::Error),
    Annotate(AnnotateError),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebError::Io(err) => write!(f, "io error: {err}"),
            WebError::Render(err) => write!(f, "template error: {err}"),
            WebError::Annotate(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<std::io::Error> for WebError {
    fn from(value: std::io::Error) -> Self {
        WebError::Io(value)
    }
}

impl From<askama::Error> for WebError {
    fn from(value: askama::Error) -> Self {
        WebError::Render(value)
    }
}

impl From<AnnotateError> for WebError {
    fn from(value: AnnotateError) -> Self {
        WebError::Annotate(value)
    }
}

pub async fn serve(config: WebConfig) -> Result<(), WebError> {
    let state = Arc::new(AppState::new(config.theme, config.base_url.clone())?);
    let router = build_router(state);
    info!(
        %config.addr,
        theme = ?config.theme,
        base = %config.base_url,
        sections = Manifesto::sections().len(),
        terms = Manifesto::glossary().len(),
        "Binding HTTP listener"
    );
    let listener = TcpListener::bind(config.addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = json!({ "error": self.message });
        (self.status, Json(payload)).into_response()
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/api/sections", get(api_sections))
        .route("/api/sections/:id", get(api_section))
        .route("/api/glossary", get(api_glossary))
        .route("/api/annotate", get(api_annotate))
        .route("/api/active-section", get(api_active_section))
        .route("/healthz", get(health))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CompressionLayer::new())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[derive(Debug, Deserialize)]
struct HomeParams {
    section: Option<String>,
}

async fn home(
    State(state): State<SharedState>,
    Query(params): Query<HomeParams>,
) -> Response {
    let rendered = render_page(state.theme, &state.base_url, params.section.as_deref());
    page_response(state.theme, rendered)
}

fn page_response(theme: WebTheme, rendered: Result<String, WebError>) -> Response {
    match rendered {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!(error = %err, "failed to render manifesto page");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_error_page(theme, err.to_string())),
            )
                .into_response()
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "analogies28-web" }))
}

#[derive(Debug, Serialize)]
struct SectionPayload<'a> {
    id: &'a str,
    title: &'a str,
    summary: Vec<Segment<'a>>,
    full_text: Vec<Segment<'a>>,
}

impl SectionPayload<'static> {
    fn from_section(section: &'static Section) -> Self {
        Self {
            id: &section.id,
            title: &section.title,
            summary: Manifesto::annotate(&section.summary),
            full_text: Manifesto::annotate(&section.full_text),
        }
    }
}

#[derive(Debug, Serialize)]
struct GlossaryPayload<'a> {
    key: &'a str,
    term: &'a str,
    definition: &'a str,
}

async fn api_sections() -> Json<Vec<SectionPayload<'static>>> {
    Json(
        Manifesto::sections()
            .iter()
            .map(SectionPayload::from_section)
            .collect(),
    )
}

async fn api_section(Path(id): Path<String>) -> Result<Json<SectionPayload<'static>>, ApiError> {
    Manifesto::section(&id)
        .map(|section| Json(SectionPayload::from_section(section)))
        .ok_or_else(|| ApiError::not_found(format!("No section with id {id:?}")))
}

async fn api_glossary() -> Json<Vec<GlossaryPayload<'static>>> {
    Json(
        Manifesto::glossary()
            .iter()
            .map(|(key, entry)| GlossaryPayload {
                key,
                term: &entry.term,
                definition: &entry.definition,
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
struct AnnotateParams {
    text: Option<String>,
    strategy: Option<String>,
}

async fn api_annotate(
    State(state): State<SharedState>,
    Query(params): Query<AnnotateParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let text = params
        .text
        .ok_or_else(|| ApiError::bad_request("Query parameter `text` is required"))?;
    if text.len() > MAX_ANNOTATE_BYTES {
        return Err(ApiError::bad_request(format!(
            "`text` exceeds {MAX_ANNOTATE_BYTES} bytes"
        )));
    }
    let strategy = params
        .strategy
        .as_deref()
        .map(str::parse::<MatchStrategy>)
        .transpose()
        .map_err(ApiError::bad_request)?
        .unwrap_or_default();
    let segments = state.annotator(strategy).annotate(&text);
    Ok(Json(json!({
        "strategy": strategy,
        "segments": segments,
        "terms": annotate::terms_used(&segments),
    })))
}

#[derive(Debug, Deserialize)]
struct ActiveSectionParams {
    offset: Option<String>,
    viewport: Option<String>,
    anchors: Option<String>,
    current: Option<String>,
}

#[derive(Debug, Serialize)]
struct ActiveSectionPayload {
    active: Option<String>,
    probe: f64,
    changed: bool,
}

async fn api_active_section(
    Query(params): Query<ActiveSectionParams>,
) -> Result<Json<ActiveSectionPayload>, ApiError> {
    let event = parse_scroll_event(&params)?;
    let mut controller = PageController::new(Manifesto::sections());
    if let Some(current) = params.current.as_deref() {
        controller.select(current);
    }
    let changed = controller.on_scroll(&event);
    Ok(Json(ActiveSectionPayload {
        active: controller.active_id().map(str::to_string),
        probe: event.metrics.probe(),
        changed,
    }))
}

fn parse_scroll_event(params: &ActiveSectionParams) -> Result<ScrollEvent, ApiError> {
    let offset = parse_number("offset", params.offset.as_deref())?;
    let viewport = parse_number("viewport", params.viewport.as_deref())?;
    if viewport < 0.0 {
        return Err(ApiError::bad_request("`viewport` must be non-negative"));
    }
    let anchors = parse_anchors(params.anchors.as_deref().unwrap_or_default())
        .map_err(ApiError::bad_request)?;
    Ok(ScrollEvent {
        metrics: ScrollMetrics::new(offset, viewport),
        anchors,
    })
}

fn parse_number(name: &str, raw: Option<&str>) -> Result<f64, ApiError> {
    let raw = raw
        .ok_or_else(|| ApiError::bad_request(format!("Query parameter `{name}` is required")))?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ApiError::bad_request(format!("`{name}` must be a finite number, got {raw:?}")))
}

struct SidebarLink {
    item: SidebarItem,
    href: String,
}

struct SectionView<'a> {
    section: &'a Section,
    full_text: Vec<SpanView<'a>>,
    summary: Vec<SpanView<'a>>,
}

/// One annotated run as the template sees it; `term` and `definition` are
/// empty for plain text.
struct SpanView<'a> {
    text: &'a str,
    is_term: bool,
    term: &'a str,
    definition: &'a str,
}

fn spans<'a>(segments: &[Segment<'a>]) -> Vec<SpanView<'a>> {
    segments
        .iter()
        .map(|segment| match *segment {
            Segment::Plain { text } => SpanView {
                text,
                is_term: false,
                term: "",
                definition: "",
            },
            Segment::Term { text, entry } => SpanView {
                text,
                is_term: true,
                term: &entry.term,
                definition: &entry.definition,
            },
        })
        .collect()
}

/// Renders the complete manifesto page. `active` preselects a sidebar entry.
pub fn render_page(theme: WebTheme, base_url: &str, active: Option<&str>) -> Result<String, WebError> {
    let chrome = Chrome::new(theme);
    let mut controller = Manifesto::controller();
    if let Some(id) = active {
        controller.select(id);
    }
    let sidebar = controller
        .snapshot()
        .sidebar
        .into_iter()
        .map(|item| SidebarLink {
            href: section_href(&item.id),
            item,
        })
        .collect();
    let sections = Manifesto::sections()
        .iter()
        .map(|section| SectionView {
            section,
            full_text: spans(&Manifesto::annotate(&section.full_text)),
            summary: spans(&Manifesto::annotate(&section.summary)),
        })
        .collect();
    let template = ManifestoTemplate {
        chrome,
        title: Manifesto::site_title(),
        outline_heading: Manifesto::outline_heading(),
        footer: Manifesto::footer(),
        canonical_url: base_url,
        json_ld: MarkupDisplay::new_safe(manifesto_json_ld(base_url), HtmlEscaper),
        sidebar,
        sections,
        probe_divisor: PROBE_DIVISOR,
        tooltip_gap: TOOLTIP_GAP_PX,
    };
    Ok(template.render()?)
}

fn render_error_page(theme: WebTheme, message: impl Into<String>) -> String {
    let template = ErrorTemplate {
        chrome: Chrome::new(theme),
        title: Manifesto::site_title(),
        message: message.into(),
    };
    template.render().unwrap_or_else(|err| {
        error!(error = %err, "failed to render error page");
        "<!DOCTYPE html><title>Error</title><p>Something went wrong</p>".to_string()
    })
}

fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

fn section_href(id: &str) -> String {
    format!("/?section={}#{}", encode_component(id), encode_component(id))
}

fn manifesto_json_ld(base_url: &str) -> String {
    let title = Manifesto::site_title();
    let parts = Manifesto::sections()
        .iter()
        .map(|section| {
            json!({
                "@type": "WebPageElement",
                "@id": format!("{base_url}#{}", section.id),
                "name": section.title,
                "abstract": section.summary,
            })
        })
        .collect::<Vec<_>>();
    let terms = Manifesto::glossary()
        .iter()
        .map(|(_, entry)| {
            json!({
                "@type": "DefinedTerm",
                "name": entry.term,
                "description": entry.definition,
            })
        })
        .collect::<Vec<_>>();
    serde_json::to_string_pretty(&json!({
        "@context": "https://schema.org",
        "@graph": [
            {
                "@type": "WebPage",
                "@id": base_url,
                "url": base_url,
                "name": title,
                "description": Manifesto::footer(),
                "hasPart": parts,
            },
            {
                "@type": "DefinedTermSet",
                "@id": format!("{base_url}#glossary"),
                "name": format!("{title} Glossary"),
                "hasDefinedTerm": terms,
            }
        ]
    }))
    .unwrap_or_else(|_| "{}".to_string())
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{{ title }}</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
    <link rel="canonical" href="{{ canonical_url }}">
    <style>
      html { scroll-behavior: smooth; }
      section[data-section] { scroll-margin-top: 8rem; }
      .glossary-tooltip { position: fixed; z-index: 50; pointer-events: none; transform: translateX(-50%) translateY(-100%); }
      .manifesto-sidebar { top: 5rem; width: 20rem; }
      .manifesto-main { margin-left: 20rem; padding-top: 8rem; }
      .manifesto-summary { top: 8rem; }
    </style>
    <script type="application/ld+json">
    {{ json_ld }}
    </script>
  </head>
  <body class="{{ chrome.body_class }}">
    <header class="{{ chrome.header_class }}">
      <h1 class="{{ chrome.brand_class }}">{{ title }}</h1>
    </header>

    <nav class="{{ chrome.nav_class }}" aria-label="{{ outline_heading }}">
      <h2 class="{{ chrome.outline_heading_class }}">{{ outline_heading }}</h2>
      <ul class="list-unstyled space-y-2">
        {% for link in sidebar %}
        <li>
          <a href="{{ link.href }}" data-section-link="{{ link.item.id }}" aria-current="{% if link.item.active %}true{% else %}false{% endif %}" class="{{ chrome.nav_item_class }} {% if link.item.active %}{{ chrome.nav_active_class }}{% else %}{{ chrome.nav_idle_class }}{% endif %}">{{ link.item.title }}</a>
        </li>
        {% endfor %}
      </ul>
    </nav>

    <main class="{{ chrome.main_class }}">
      {% for view in sections %}
      <section id="{{ view.section.id }}" data-section="{{ view.section.id }}">
        <div class="{{ chrome.grid_class }}">
          <div class="col-lg-6 lg:pr-8">
            <h2 class="{{ chrome.section_title_class }}">{{ view.section.title }}</h2>
            <h3 class="{{ chrome.column_heading_class }}">Full Text</h3>
            <p class="{{ chrome.full_text_class }}">{% for span in view.full_text %}{% if span.is_term %}<span class="glossary-term {{ chrome.term_class }}" tabindex="0" data-term="{{ span.term }}" data-definition="{{ span.definition }}">{{ span.text }}</span>{% else %}{{ span.text }}{% endif %}{% endfor %}</p>
          </div>
          <div class="col-lg-6 lg:pl-8">
            <div class="{{ chrome.summary_card_class }}">
              <h3 class="{{ chrome.column_heading_class }}">Summary</h3>
              <p class="{{ chrome.summary_text_class }}">{% for span in view.summary %}{% if span.is_term %}<span class="glossary-term {{ chrome.term_class }}" tabindex="0" data-term="{{ span.term }}" data-definition="{{ span.definition }}">{{ span.text }}</span>{% else %}{{ span.text }}{% endif %}{% endfor %}</p>
            </div>
          </div>
        </div>
      </section>
      {% endfor %}
    </main>

    <footer class="{{ chrome.footer_class }}">
      <p>{{ footer }}</p>
    </footer>

    <div id="glossary-tooltip" class="glossary-tooltip {{ chrome.tooltip_class }}" role="tooltip" hidden>
      <div class="font-semibold fw-semibold mb-1" data-tooltip-term></div>
      <div data-tooltip-definition></div>
    </div>

    <script>
      (() => {
        const PROBE_DIVISOR = {{ probe_divisor }};
        const TOOLTIP_GAP = {{ tooltip_gap }};
        const activeClasses = "{{ chrome.nav_active_class|safe }}".split(" ").filter(Boolean);
        const idleClasses = "{{ chrome.nav_idle_class|safe }}".split(" ").filter(Boolean);
        const links = new Map(
          Array.from(document.querySelectorAll("[data-section-link]")).map((el) => [el.dataset.sectionLink, el])
        );
        const ids = Array.from(links.keys());

        const setActive = (id) => {
          links.forEach((el, key) => {
            const on = key === id;
            el.classList.remove(...(on ? idleClasses : activeClasses));
            el.classList.add(...(on ? activeClasses : idleClasses));
            el.setAttribute("aria-current", on ? "true" : "false");
          });
        };

        const onScroll = () => {
          const probe = window.scrollY + window.innerHeight / PROBE_DIVISOR;
          for (let i = ids.length - 1; i >= 0; i--) {
            const anchor = document.getElementById(ids[i]);
            if (anchor && anchor.offsetTop <= probe) {
              setActive(ids[i]);
              break;
            }
          }
        };
        window.addEventListener("scroll", onScroll, { passive: true });
        window.addEventListener("pagehide", () => window.removeEventListener("scroll", onScroll), { once: true });

        links.forEach((el, id) => {
          el.addEventListener("click", (event) => {
            const anchor = document.getElementById(id);
            if (!anchor) return;
            event.preventDefault();
            anchor.scrollIntoView({ behavior: "smooth" });
          });
        });

        const tooltip = document.getElementById("glossary-tooltip");
        const tooltipTerm = tooltip.querySelector("[data-tooltip-term]");
        const tooltipDefinition = tooltip.querySelector("[data-tooltip-definition]");
        document.querySelectorAll(".glossary-term").forEach((el) => {
          const show = () => {
            const rect = el.getBoundingClientRect();
            tooltipTerm.textContent = el.dataset.term;
            tooltipDefinition.textContent = el.dataset.definition;
            tooltip.style.left = `${rect.left + rect.width / 2}px`;
            tooltip.style.top = `${rect.top - TOOLTIP_GAP}px`;
            tooltip.hidden = false;
          };
          const hide = () => {
            tooltip.hidden = true;
          };
          el.addEventListener("mouseenter", show);
          el.addEventListener("mouseleave", hide);
          el.addEventListener("focus", show);
          el.addEventListener("blur", hide);
        });
      })();
    </script>
  </body>
</html>"#,
    ext = "html"
)]
struct ManifestoTemplate<'a> {
    chrome: Chrome,
    title: &'a str,
    outline_heading: &'a str,
    footer: &'a str,
    canonical_url: &'a str,
    json_ld: SafeJson,
    sidebar: Vec<SidebarLink>,
    sections: Vec<SectionView<'a>>,
    probe_divisor: f64,
    tooltip_gap: f64,
}

#[derive(Template)]
#[template(
    source = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>{{ title }} • Error</title>
    {% if chrome.use_tailwind %}
    <script src="https://cdn.jsdelivr.net/npm/@tailwindcss/browser@4"></script>
    {% endif %}
    {% if chrome.use_bootstrap %}
    <link href="https://cdn.jsdelivr.net/npm/bootstrap@5.3.8/dist/css/bootstrap.min.css" rel="stylesheet" integrity="sha384-sRIl4kxILFvY47J16cr9ZwB07vP4J8+LH7qKQnuqkuIAvNWLzeN8tE5YBujZqJLB" crossorigin="anonymous">
    {% endif %}
  </head>
  <body class="{{ chrome.body_class }}">
    <main class="{{ chrome.main_class }}">
      <h1 class="{{ chrome.headline_class }}">Something went wrong</h1>
      <p class="{{ chrome.lede_class }}">{{ message }}</p>
      <a href="/" class="{{ chrome.button_class }}">Back to the manifesto</a>
    </main>
  </body>
</html>"#,
    ext = "html"
)]
struct ErrorTemplate<'a> {
    chrome: Chrome,
    title: &'a str,
    message: String,
}

#[cfg(all(test, feature = "web"))]
mod tests {
    use super::*;
    use axum::{body, body::Body, http::Request};
    use tower::ServiceExt;

    fn test_router() -> Router {
        let state = Arc::new(AppState::new(WebTheme::Tailwind, "http://127.0.0.1:8080").unwrap());
        build_router(state)
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = test_router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_html(uri: &str) -> (StatusCode, String) {
        let response = test_router()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn home_renders_every_section_and_tooltip() {
        let (status, html) = get_html("/").await;
        assert!(status.is_success());
        for section in Manifesto::sections() {
            assert!(html.contains(&format!("<section id=\"{}\"", section.id)));
        }
        assert!(html.contains("Manifesto Outline"));
        assert!(html.contains("data-term=\"Mutual Aid\""));
        assert!(html.contains("application/ld+json"));
        assert!(html.contains("const PROBE_DIVISOR = 3;"));
        assert!(html.contains("A manifesto for social progress."));
    }

    #[tokio::test]
    async fn home_preselects_requested_section() {
        let (_, html) = get_html("/?section=democracy").await;
        assert!(html.contains(r#"data-section-link="democracy" aria-current="true""#));
        assert!(html.contains(r#"data-section-link="introduction" aria-current="false""#));
    }

    #[tokio::test]
    async fn home_ignores_unknown_section() {
        let (status, html) = get_html("/?section=nowhere").await;
        assert!(status.is_success());
        assert!(html.contains(r#"data-section-link="introduction" aria-current="true""#));
    }

    #[tokio::test]
    async fn api_sections_lists_annotated_text() {
        let (status, payload) = get_json("/api/sections").await;
        assert!(status.is_success());
        let sections = payload.as_array().unwrap();
        assert_eq!(sections.len(), 6);
        let first = &sections[0]["full_text"][0];
        assert_eq!(first["kind"], "term");
        assert_eq!(first["text"], "Social progress");
        assert_eq!(first["entry"]["term"], "Social Progress");
    }

    #[tokio::test]
    async fn api_section_unknown_is_404() {
        let (status, payload) = get_json("/api/sections/nowhere").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(payload["error"].as_str().unwrap().contains("nowhere"));
    }

    #[tokio::test]
    async fn api_glossary_is_key_ordered() {
        let (_, payload) = get_json("/api/glossary").await;
        let keys: Vec<_> = payload
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["key"].as_str().unwrap().to_string())
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 9);
    }

    #[tokio::test]
    async fn api_annotate_wraps_terms() {
        let (status, payload) =
            get_json("/api/annotate?text=Fund%20MUTUAL%20AID%20not%20maids").await;
        assert!(status.is_success());
        assert_eq!(payload["strategy"], "longest_at_position");
        let segments = payload["segments"].as_array().unwrap();
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[1]["text"], "MUTUAL AID");
        assert_eq!(payload["terms"][0]["term"], "Mutual Aid");
    }

    #[tokio::test]
    async fn api_annotate_accepts_short_strategy_names() {
        let (status, payload) =
            get_json("/api/annotate?text=mutual%20aid&strategy=priority").await;
        assert!(status.is_success());
        assert_eq!(payload["strategy"], "term_priority");
    }

    #[tokio::test]
    async fn api_annotate_rejects_unknown_strategy_as_json() {
        let (status, payload) = get_json("/api/annotate?text=aid&strategy=bogus").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["error"].as_str().unwrap().contains("bogus"));
    }

    #[tokio::test]
    async fn api_annotate_requires_text() {
        let (status, _) = get_json("/api/annotate").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn api_active_section_uses_probe() {
        let (status, payload) =
            get_json("/api/active-section?offset=750&viewport=900&anchors=0,800,1600").await;
        assert!(status.is_success());
        assert_eq!(payload["active"], "equity");
        assert_eq!(payload["probe"], 1050.0);
        assert_eq!(payload["changed"], true);

        let (_, payload) =
            get_json("/api/active-section?offset=0&viewport=900&anchors=0,800,1600").await;
        assert_eq!(payload["active"], "introduction");
        assert_eq!(payload["changed"], false);
    }

    #[tokio::test]
    async fn api_active_section_keeps_current_above_anchors() {
        let (_, payload) = get_json(
            "/api/active-section?offset=0&viewport=900&anchors=5000,6000&current=democracy",
        )
        .await;
        assert_eq!(payload["active"], "democracy");
    }

    #[tokio::test]
    async fn api_active_section_rejects_bad_anchors() {
        let (status, payload) =
            get_json("/api/active-section?offset=0&viewport=900&anchors=0,abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["error"].as_str().unwrap().contains("abc"));
    }

    #[tokio::test]
    async fn api_active_section_rejects_bad_numbers_as_json() {
        let (status, payload) =
            get_json("/api/active-section?offset=abc&viewport=900&anchors=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["error"].as_str().unwrap().contains("offset"));

        let (status, payload) =
            get_json("/api/active-section?offset=0&viewport=-5&anchors=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["error"].as_str().unwrap().contains("viewport"));

        let (status, payload) = get_json("/api/active-section?viewport=900").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(payload["error"].as_str().unwrap().contains("required"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_, payload) = get_json("/healthz").await;
        assert_eq!(payload["status"], "ok");
    }

    #[test]
    fn spans_carry_term_and_definition() {
        let glossary = crate::Glossary::from_entries([crate::GlossaryEntry::new(
            "Aid",
            "Help \"now\" & <later>",
        )])
        .unwrap();
        let annotator = Annotator::new(&glossary).unwrap();
        let spans = spans(&annotator.annotate("<b>aid</b>"));
        assert_eq!(spans.len(), 3);
        assert!(!spans[0].is_term);
        assert_eq!(spans[0].text, "<b>");
        assert!(spans[1].is_term);
        assert_eq!(spans[1].term, "Aid");
        assert_eq!(spans[1].definition, "Help \"now\" & <later>");
    }

    #[test]
    fn page_wraps_terms_in_tooltip_spans() {
        let html = render_page(WebTheme::Tailwind, "http://127.0.0.1:8080", None).unwrap();
        assert!(html.contains(
            r#"tabindex="0" data-term="Mutual Aid" data-definition="Community-based support systems where people help each other meet basic needs and work together for collective wellbeing.">mutual aid</span>"#
        ));
        assert!(!html.contains("&lt;span"));
    }

    #[test]
    fn render_failure_is_a_server_error() {
        let failure = WebError::Io(std::io::Error::other("disk full"));
        let response = page_response(WebTheme::Bootstrap, Err(failure));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let response = page_response(WebTheme::Bootstrap, Ok("<p>ok</p>".to_string()));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn bootstrap_page_renders() {
        let html = render_page(WebTheme::Bootstrap, "https://example.org", Some("community")).unwrap();
        assert!(html.contains("bootstrap.min.css"));
        assert!(html.contains(r#"rel="canonical""#));
        assert!(html.contains(r#"data-section-link="community" aria-current="true""#));
    }

    #[test]
    fn themes_parse_case_insensitively() {
        assert_eq!("Bootstrap".parse::<WebTheme>().unwrap(), WebTheme::Bootstrap);
        assert!("plain".parse::<WebTheme>().is_err());
    }

    #[test]
    fn error_page_escapes_message() {
        let html = render_error_page(WebTheme::Tailwind, "<oops>");
        assert!(html.contains("&lt;oops&gt;"));
    }
}
