// src/fetch.rs
//! Page fetcher and validator.
//!
//! `PageFetcher::fetch` never fails past its own boundary: not-found, other
//! HTTP errors and transport errors all collapse into `None` after logging.
//! Parsing is synchronous and happens on an owned body, so no parsed tree is
//! ever held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};

use crate::text::collapse_whitespace;

/// Browser-like header set sent with every page request.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
    ),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("Accept-Encoding", "gzip, deflate"),
    ("Connection", "keep-alive"),
];

/// Title substrings that mark an error page.
pub const NOT_FOUND_TITLE_MARKERS: &[&str] = &["not found", "404", "error", "page not found"];

/// Pages with less visible text than this are empty shells.
pub const MIN_PAGE_TEXT_CHARS: usize = 100;

// ------------------------------------------------------------
// Transport seam
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Request(String),
    #[error("reading body failed: {0}")]
    Body(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError>;
}

pub type DynTransport = Arc<dyn HttpTransport>;

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .gzip(true)
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        let mut req = self.client.get(url).timeout(timeout);
        for (k, v) in headers {
            req = req.header(*k, *v);
        }
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Request(e.to_string())
            }
        })?;
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// In-memory transport serving canned pages; unknown URLs answer 404.
/// Records every requested URL so tests can assert on request order.
#[derive(Default)]
pub struct FixtureTransport {
    pages: HashMap<String, HttpResponse>,
    failures: HashMap<String, TransportError>,
    requests: Mutex<Vec<String>>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: impl Into<String>) -> Self {
        self.pages.insert(
            url.to_string(),
            HttpResponse {
                status: 200,
                body: body.into(),
            },
        );
        self
    }

    pub fn status(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.pages.insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.into(),
            },
        );
        self
    }

    pub fn failing(mut self, url: &str, err: TransportError) -> Self {
        self.failures.insert(url.to_string(), err);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}

#[async_trait]
impl HttpTransport for FixtureTransport {
    async fn get(
        &self,
        url: &str,
        _headers: &[(&str, &str)],
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.requests
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(url.to_string());
        if let Some(err) = self.failures.get(url) {
            return Err(err.clone());
        }
        Ok(self.pages.get(url).cloned().unwrap_or(HttpResponse {
            status: 404,
            body: String::new(),
        }))
    }
}

// ------------------------------------------------------------
// Document
// ------------------------------------------------------------

/// A successfully fetched page: the final URL and its raw HTML.
#[derive(Debug, Clone)]
pub struct Document {
    pub url: String,
    pub body: String,
}

impl Document {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn parse(&self) -> Html {
        Html::parse_document(&self.body)
    }

    pub fn is_valid(&self) -> bool {
        is_valid_html(&self.parse())
    }
}

/// A missing document is never valid.
pub fn is_valid(doc: Option<&Document>) -> bool {
    doc.map(Document::is_valid).unwrap_or(false)
}

static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("title selector"));
static SEL_META_HTTP_EQUIV: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[http-equiv]").expect("meta http-equiv selector"));

pub fn page_title(html: &Html) -> String {
    html.select(&SEL_TITLE)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .unwrap_or_default()
}

pub fn is_valid_html(html: &Html) -> bool {
    let title = page_title(html).to_lowercase();
    if NOT_FOUND_TITLE_MARKERS.iter().any(|m| title.contains(m)) {
        tracing::debug!(title = %title, "page rejected: error title");
        return false;
    }
    let has_refresh = html.select(&SEL_META_HTTP_EQUIV).any(|m| {
        m.value()
            .attr("http-equiv")
            .map(|v| v.trim().eq_ignore_ascii_case("refresh"))
            .unwrap_or(false)
    });
    if has_refresh {
        tracing::debug!("page rejected: meta refresh");
        return false;
    }
    let text_len = document_text(html).chars().count();
    if text_len < MIN_PAGE_TEXT_CHARS {
        tracing::debug!(text_len, "page rejected: too little text");
        return false;
    }
    true
}

fn is_hidden_text_container(name: &str) -> bool {
    matches!(name, "script" | "style" | "noscript" | "template")
}

/// Visible text under `el`, script/style content removed, whitespace collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        if let Node::Text(t) = node.value() {
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map(|e| is_hidden_text_container(e.name()))
                    .unwrap_or(false)
            });
            if !hidden {
                out.push_str(t);
                out.push(' ');
            }
        }
    }
    collapse_whitespace(&out)
}

/// Whole-document visible text.
pub fn document_text(html: &Html) -> String {
    element_text(html.root_element())
}

// ------------------------------------------------------------
// Fetcher
// ------------------------------------------------------------

#[derive(Debug)]
pub enum FetchOutcome {
    Ok(Document),
    NotFound(u16),
    HttpError(u16),
    Transport(TransportError),
}

#[derive(Clone)]
pub struct PageFetcher {
    transport: DynTransport,
    timeout: Duration,
}

static METRICS_DESCRIBED: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();

fn ensure_metrics_described() {
    METRICS_DESCRIBED.get_or_init(|| {
        metrics::describe_counter!(
            "fetch_total",
            "Page fetches by outcome (ok, not_found, http_error, transport_error)."
        );
    });
}

impl PageFetcher {
    pub fn new(transport: DynTransport, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// One GET, classified.
    pub async fn fetch_outcome(&self, url: &str) -> FetchOutcome {
        ensure_metrics_described();
        let outcome = match self.transport.get(url, DEFAULT_HEADERS, self.timeout).await {
            Ok(resp) if resp.status == 403 || resp.status == 404 => {
                FetchOutcome::NotFound(resp.status)
            }
            Ok(resp) if !(200..300).contains(&resp.status) => FetchOutcome::HttpError(resp.status),
            Ok(resp) => FetchOutcome::Ok(Document::new(url, resp.body)),
            Err(e) => FetchOutcome::Transport(e),
        };
        let label = match &outcome {
            FetchOutcome::Ok(_) => "ok",
            FetchOutcome::NotFound(_) => "not_found",
            FetchOutcome::HttpError(_) => "http_error",
            FetchOutcome::Transport(_) => "transport_error",
        };
        metrics::counter!("fetch_total", "outcome" => label).increment(1);
        outcome
    }

    pub async fn fetch(&self, url: &str) -> Option<Document> {
        match self.fetch_outcome(url).await {
            FetchOutcome::Ok(doc) => Some(doc),
            FetchOutcome::NotFound(status) => {
                tracing::info!(url = %url, status, "page not found");
                None
            }
            FetchOutcome::HttpError(status) => {
                tracing::warn!(url = %url, status, "page fetch failed");
                None
            }
            FetchOutcome::Transport(e) => {
                tracing::warn!(url = %url, error = %e, "page fetch failed");
                None
            }
        }
    }

    /// Fetch and keep the page only when it validates.
    pub async fn fetch_valid(&self, url: &str) -> Option<Document> {
        self.fetch(url).await.filter(Document::is_valid)
    }
}
