// src/search/devpost.rs
//! Event-listing catalog: paginated HTML search results.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};

use super::{CatalogMetrics, CatalogSource, Platform, RawResult};
use crate::extract::resolve_url;
use crate::fetch::{element_text, DynTransport, DEFAULT_HEADERS};
use crate::text::{first_number, normalize_url};

fn sel(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static SEL_CARD_LINK: Lazy<Selector> = Lazy::new(|| sel("a.block-wrapper-link"));
static SEL_ENTRY: Lazy<Selector> = Lazy::new(|| sel("div.software-entry"));
static SEL_NAME: Lazy<Selector> = Lazy::new(|| sel("h5"));
static SEL_TAGLINE: Lazy<Selector> = Lazy::new(|| sel("p.tagline"));
static SEL_BADGE: Lazy<Selector> = Lazy::new(|| sel("aside.entry-badge"));
static SEL_LIKES: Lazy<Selector> = Lazy::new(|| sel("span.like-count"));
static SEL_COMMENTS: Lazy<Selector> = Lazy::new(|| sel("span.comment-count"));

/// Parse one search-results page. Returns the number of card links seen
/// (zero means the listing ran out) and the parsed results.
pub fn parse_listing_page(body: &str, base: &str) -> (usize, Vec<RawResult>) {
    let html = Html::parse_document(body);
    let links: Vec<_> = html.select(&SEL_CARD_LINK).collect();
    let mut out = Vec::new();

    for link in &links {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let Some(entry) = link.select(&SEL_ENTRY).next() else {
            continue;
        };

        let text_of = |s: &Selector| entry.select(s).next().map(element_text);
        let name = text_of(&SEL_NAME)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        let description = text_of(&SEL_TAGLINE)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No description".to_string());
        let is_winner = text_of(&SEL_BADGE)
            .map(|t| t.to_lowercase().contains("winner"))
            .unwrap_or(false);
        let likes = text_of(&SEL_LIKES).map(|t| first_number(&t)).unwrap_or(0);
        let comments = text_of(&SEL_COMMENTS).map(|t| first_number(&t)).unwrap_or(0);

        out.push(RawResult {
            name,
            description,
            url: resolve_url(base, href),
            metrics: CatalogMetrics::Listing {
                likes,
                comments,
                is_winner,
                submission_date: None,
            },
        });
    }
    (links.len(), out)
}

pub struct DevpostSearch {
    transport: DynTransport,
    base: String,
    timeout: Duration,
    page_delay: Duration,
}

impl DevpostSearch {
    pub fn new(transport: DynTransport, base: &str, timeout: Duration, page_delay: Duration) -> Self {
        Self {
            transport,
            base: base.trim_end_matches('/').to_string(),
            timeout,
            page_delay,
        }
    }

    fn page_url(&self, query: &str, page: usize) -> String {
        let endpoint = format!("{}/software/search", self.base);
        match url::Url::parse_with_params(
            &endpoint,
            &[("page", page.to_string().as_str()), ("query", query)],
        ) {
            Ok(u) => u.to_string(),
            Err(_) => format!("{endpoint}?page={page}&query={query}"),
        }
    }
}

#[async_trait]
impl CatalogSource for DevpostSearch {
    fn platform(&self) -> Platform {
        Platform::Devpost
    }

    /// `limit` is the number of result pages to walk.
    async fn fetch_results(&self, query: &str, limit: usize) -> Vec<RawResult> {
        let mut seen_urls = HashSet::new();
        let mut out = Vec::new();

        for page in 1..=limit.max(1) {
            let url = self.page_url(query, page);
            let resp = match self.transport.get(&url, DEFAULT_HEADERS, self.timeout).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(query = %query, page, error = %e, "listing search failed");
                    break;
                }
            };
            if resp.status != 200 {
                tracing::warn!(query = %query, page, status = resp.status, "listing search stopped");
                break;
            }

            let (links, results) = parse_listing_page(&resp.body, &self.base);
            if links == 0 {
                tracing::debug!(query = %query, page, "listing exhausted");
                break;
            }
            for r in results {
                if seen_urls.insert(normalize_url(&r.url)) {
                    out.push(r);
                }
            }

            if page < limit && !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FixtureTransport;
    use std::sync::Arc;

    pub(crate) fn card(href: &str, name: &str, tagline: &str, badge: &str, likes: u32) -> String {
        format!(
            r#"<a class="block-wrapper-link" href="{href}">
                 <div class="software-entry">
                   <h5>{name}</h5><p class="tagline">{tagline}</p>
                   <aside class="entry-badge">{badge}</aside>
                   <span class="like-count">{likes}</span><span class="comment-count">2 comments</span>
                 </div>
               </a>"#
        )
    }

    #[test]
    fn parses_cards_with_defaults() {
        let body = format!(
            "<html><body>{}{}<a class=\"block-wrapper-link\" href=\"/x\">no entry</a></body></html>",
            card("/software/alpha", "Alpha", "Checks facts live", "Winner", 12),
            r#"<a class="block-wrapper-link" href="https://devpost.com/software/beta"><div class="software-entry"></div></a>"#,
        );
        let (links, results) = parse_listing_page(&body, "https://devpost.com");
        assert_eq!(links, 3);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://devpost.com/software/alpha");
        assert_eq!(
            results[0].metrics,
            CatalogMetrics::Listing {
                likes: 12,
                comments: 2,
                is_winner: true,
                submission_date: None
            }
        );
        assert_eq!(results[1].name, "Unknown");
        assert_eq!(results[1].description, "No description");
    }

    #[tokio::test]
    async fn stops_on_empty_page_and_dedups_urls() {
        let page1 = format!(
            "<html><body>{}{}</body></html>",
            card("/software/alpha", "Alpha", "one", "", 1),
            card("/software/alpha/", "Alpha again", "two", "", 1),
        );
        let t = Arc::new(
            FixtureTransport::new()
                .page("https://devpost.com/software/search?page=1&query=fact+check", page1)
                .page("https://devpost.com/software/search?page=2&query=fact+check", "<html></html>"),
        );
        let src = DevpostSearch::new(t.clone(), "https://devpost.com/", Duration::from_secs(1), Duration::ZERO);
        let results = src.fetch_results("fact check", 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(t.requests().len(), 2);
    }
}
