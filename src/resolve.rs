// src/resolve.rs
//! Tab/section resolution for an event site.
//!
//! Two strategies run strictly in order:
//! 1) navigation links on the base page, matched against per-kind vocabularies
//! 2) probing default and alternative suffixes for every kind still missing
//!
//! A kind resolved by an earlier strategy is never revisited. Kinds nobody
//! resolves are absent from the map rather than mapped to a default path.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use crate::chain::first_accepted_async;
use crate::classify::{self, SectionKind, NAV_SELECTORS};
use crate::fetch::{element_text, Document, PageFetcher};

/// Resolved kinds and the relative path that served each.
pub type TabMap = BTreeMap<SectionKind, String>;

static SEL_NAV: Lazy<Vec<Selector>> = Lazy::new(|| {
    NAV_SELECTORS
        .iter()
        .map(|s| Selector::parse(s).expect("nav selector"))
        .collect()
});

static METRICS_DESCRIBED: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();

fn ensure_metrics_described() {
    METRICS_DESCRIBED.get_or_init(|| {
        metrics::describe_counter!(
            "resolver_tabs_resolved_total",
            "Sections resolved, by discovery strategy."
        );
    });
}

/// Normalize a navigation href into a path suffix, or reject it.
fn nav_path(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("http")
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
    {
        return None;
    }
    Some(if href.starts_with('/') {
        href.to_string()
    } else {
        format!("/{href}")
    })
}

/// Navigation-link strategy over an already parsed base page.
pub fn nav_strategy(html: &Html) -> TabMap {
    let mut tabs = TabMap::new();
    for selector in SEL_NAV.iter() {
        for anchor in html.select(selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let text = element_text(anchor).to_lowercase();
            if text.is_empty() || classify::is_nav_excluded(&text) {
                continue;
            }
            let Some(path) = nav_path(href) else {
                continue;
            };
            if let Some(kind) = classify::kind_for_nav_text(&text) {
                tabs.entry(kind).or_insert(path);
            }
        }
    }
    tabs
}

/// Paths probed for `kind`, default first, duplicates removed.
pub fn probe_paths(kind: SectionKind) -> Vec<&'static str> {
    let mut paths = vec![kind.default_path()];
    for alt in kind.alternative_paths() {
        if !paths.contains(alt) {
            paths.push(alt);
        }
    }
    paths
}

pub struct TabResolver {
    fetcher: PageFetcher,
}

impl TabResolver {
    pub fn new(fetcher: PageFetcher) -> Self {
        Self { fetcher }
    }

    pub async fn resolve(&self, base_url: &str) -> TabMap {
        ensure_metrics_described();
        let base = base_url.trim_end_matches('/');

        let Some(base_doc) = self.fetcher.fetch(base).await else {
            tracing::warn!(url = %base, "could not load base page, no sections resolved");
            return TabMap::new();
        };

        let mut tabs = nav_strategy(&base_doc.parse());
        let from_nav = tabs.len();
        metrics::counter!("resolver_tabs_resolved_total", "strategy" => "navigation")
            .increment(from_nav as u64);

        for kind in SectionKind::ALL {
            if tabs.contains_key(&kind) {
                continue;
            }
            if let Some(path) = self.probe(base, kind, &base_doc).await {
                tabs.insert(kind, path.to_string());
            }
        }
        metrics::counter!("resolver_tabs_resolved_total", "strategy" => "probe")
            .increment((tabs.len() - from_nav) as u64);

        tracing::info!(
            url = %base,
            from_nav,
            total = tabs.len(),
            kinds = ?tabs.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
            "sections resolved"
        );
        tabs
    }

    async fn probe(&self, base: &str, kind: SectionKind, base_doc: &Document) -> Option<&'static str> {
        let fetcher = &self.fetcher;
        first_accepted_async(
            probe_paths(kind),
            |path| {
                // The empty suffix is the base page itself, already in hand.
                let cached = path.is_empty().then(|| base_doc.clone());
                let url = format!("{base}{path}");
                async move {
                    match cached {
                        Some(doc) => Some(doc),
                        None => fetcher.fetch(&url).await,
                    }
                }
            },
            Document::is_valid,
        )
        .await
        .map(|(path, _)| path)
    }
}
