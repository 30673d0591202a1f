// src/search/mod.rs
//! Search-and-dedup engine over the two catalogs.
//!
//! Catalog sources only fetch and parse. Everything that decides whether a
//! result survives (URL exclusion, word cap, content-hash dedup, the
//! per-query cache) lives on `SearchRun`, which is created fresh for every
//! similarity check and never shared between runs.

pub mod devpost;
pub mod github;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::scout::SearchConfig;
use crate::extract::project::extract_submission_date;
use crate::fetch::PageFetcher;
use crate::strategy::SearchStrategy;
use crate::text::{anon_id, content_hash, normalize_url, truncate_words};

pub use devpost::DevpostSearch;
pub use github::GithubSearch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    /// Event-listing catalog.
    Devpost,
    /// Code-hosting catalog.
    GitHub,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Devpost => "Devpost",
            Platform::GitHub => "GitHub",
        }
    }
}

/// Catalog-specific popularity fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogMetrics {
    Code {
        full_name: String,
        stars: u64,
        language: String,
        created_at: String,
        updated_at: String,
    },
    Listing {
        likes: u64,
        comments: u64,
        is_winner: bool,
        #[serde(default)]
        submission_date: Option<String>,
    },
}

/// One search hit as parsed from a catalog, before run-level filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    pub name: String,
    pub description: String,
    pub url: String,
    pub metrics: CatalogMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProject {
    pub platform: Platform,
    pub name: String,
    pub description: String,
    pub url: String,
    #[serde(flatten)]
    pub metrics: CatalogMetrics,
    pub search_query: String,
    pub hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_similarity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_reasoning: Option<String>,
}

impl CandidateProject {
    /// Short stable identifier used to match model scores back to candidates.
    pub fn id(&self) -> &str {
        &self.hash[..self.hash.len().min(12)]
    }
}

/// Fetch-and-parse side of a catalog. `limit` bounds pages for the event
/// listing and items for code hosting. Failures yield whatever was collected.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_results(&self, query: &str, limit: usize) -> Vec<RawResult>;
    fn platform(&self) -> Platform;
}

// ------------------------------------------------------------
// Per-run state
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    Excluded,
    Duplicate,
}

/// Mutable state of one similarity-check run.
#[derive(Debug, Default)]
pub struct SearchRun {
    exclude_url: Option<String>,
    seen_hashes: HashSet<String>,
    cache: HashMap<(Platform, String), Vec<CandidateProject>>,
    collected_urls: HashSet<String>,
}

impl SearchRun {
    pub fn new(exclude_url: Option<&str>) -> Self {
        let mut run = Self::default();
        run.reset(exclude_url);
        run
    }

    /// Clear every cache and set, then install a new exclusion.
    pub fn reset(&mut self, exclude_url: Option<&str>) {
        self.seen_hashes.clear();
        self.cache.clear();
        self.collected_urls.clear();
        self.exclude_url = exclude_url.map(normalize_url).filter(|u| !u.is_empty());
        if let Some(u) = &self.exclude_url {
            self.collected_urls.insert(u.clone());
        }
    }

    pub fn exclude_url(&self) -> Option<&str> {
        self.exclude_url.as_deref()
    }

    pub fn seen_count(&self) -> usize {
        self.seen_hashes.len()
    }

    /// Run one raw result through exclusion, word cap and hash dedup.
    pub fn admit(
        &mut self,
        platform: Platform,
        raw: RawResult,
        query: &str,
        word_limit: usize,
    ) -> (Admission, Option<CandidateProject>) {
        if self.exclude_url.as_deref() == Some(normalize_url(&raw.url).as_str()) {
            metrics::counter!("search_excluded_total").increment(1);
            tracing::info!(url = %raw.url, "skipping submitted project");
            return (Admission::Excluded, None);
        }

        let description = truncate_words(&raw.description, word_limit);
        let hash = content_hash(&description);
        if !self.seen_hashes.insert(hash.clone()) {
            metrics::counter!("search_dedup_total").increment(1);
            tracing::debug!(name = %raw.name, desc_id = %anon_id(&description), "skipping duplicate");
            return (Admission::Duplicate, None);
        }

        let candidate = CandidateProject {
            platform,
            name: raw.name,
            description,
            url: raw.url,
            metrics: raw.metrics,
            search_query: query.to_string(),
            hash,
            ai_similarity: None,
            ai_reasoning: None,
        };
        (Admission::Accepted, Some(candidate))
    }

    /// First claim of a normalized URL across catalogs wins.
    pub fn claim_url(&mut self, url: &str) -> bool {
        self.collected_urls.insert(normalize_url(url))
    }
}

// ------------------------------------------------------------
// Engine
// ------------------------------------------------------------

/// Progress notifications from `search_all`.
#[derive(Debug)]
pub enum SearchEvent<'a> {
    QueryStarted {
        platform: Platform,
        index: usize,
        total: usize,
        query: &'a str,
    },
    Candidate {
        candidate: &'a CandidateProject,
        platform_count: usize,
    },
}

static METRICS_DESCRIBED: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();

fn ensure_metrics_described() {
    METRICS_DESCRIBED.get_or_init(|| {
        metrics::describe_counter!("search_queries_total", "Catalog queries issued, by catalog.");
        metrics::describe_counter!("search_cache_hits_total", "Queries answered from the run cache.");
        metrics::describe_counter!("search_dedup_total", "Results dropped as content duplicates.");
        metrics::describe_counter!("search_excluded_total", "Results dropped as the submitted project.");
    });
}

#[derive(Clone)]
pub struct SearchEngine {
    listing: Arc<dyn CatalogSource>,
    code: Arc<dyn CatalogSource>,
    fetcher: PageFetcher,
    cfg: SearchConfig,
    word_limit: usize,
}

impl SearchEngine {
    pub fn new(
        listing: Arc<dyn CatalogSource>,
        code: Arc<dyn CatalogSource>,
        fetcher: PageFetcher,
        cfg: SearchConfig,
        word_limit: usize,
    ) -> Self {
        Self {
            listing,
            code,
            fetcher,
            cfg,
            word_limit,
        }
    }

    fn source(&self, platform: Platform) -> &Arc<dyn CatalogSource> {
        match platform {
            Platform::Devpost => &self.listing,
            Platform::GitHub => &self.code,
        }
    }

    fn default_limit(&self, platform: Platform) -> usize {
        match platform {
            Platform::Devpost => self.cfg.listing_pages,
            Platform::GitHub => self.cfg.code_results,
        }
    }

    /// One query against one catalog, filtered through the run state.
    pub async fn search(
        &self,
        run: &mut SearchRun,
        strategy: &SearchStrategy,
        platform: Platform,
        limit: usize,
    ) -> Vec<CandidateProject> {
        ensure_metrics_described();
        let key = (platform, strategy.query.clone());
        if let Some(hit) = run.cache.get(&key) {
            metrics::counter!("search_cache_hits_total").increment(1);
            tracing::info!(catalog = platform.as_str(), query = %strategy.query, "cached query");
            return hit.clone();
        }

        metrics::counter!("search_queries_total", "catalog" => platform.as_str()).increment(1);
        let raw = self.source(platform).fetch_results(&strategy.query, limit).await;
        let returned = raw.len();

        let mut out = Vec::new();
        for r in raw {
            if let (Admission::Accepted, Some(mut c)) =
                run.admit(platform, r, &strategy.query, self.word_limit)
            {
                if platform == Platform::Devpost && self.cfg.fetch_submission_dates {
                    self.attach_submission_date(&mut c).await;
                }
                out.push(c);
            }
        }

        tracing::info!(
            catalog = platform.as_str(),
            query = %strategy.query,
            returned,
            kept = out.len(),
            "query finished"
        );
        run.cache.insert(key, out.clone());
        out
    }

    async fn attach_submission_date(&self, candidate: &mut CandidateProject) {
        let Some(doc) = self.fetcher.fetch(&candidate.url).await else {
            return;
        };
        let date = extract_submission_date(&doc.parse());
        if let CatalogMetrics::Listing {
            submission_date, ..
        } = &mut candidate.metrics
        {
            *submission_date = date;
        }
    }

    /// Event-listing queries for every strategy, then code-hosting queries,
    /// each in strategy order. Results already claimed by URL are dropped.
    pub async fn search_all<F>(
        &self,
        run: &mut SearchRun,
        strategies: &[SearchStrategy],
        mut on_event: F,
    ) -> Vec<CandidateProject>
    where
        F: FnMut(SearchEvent<'_>),
    {
        let mut all = Vec::new();
        let total = strategies.len();
        let query_delay = Duration::from_millis(self.cfg.query_delay_ms);

        for platform in [Platform::Devpost, Platform::GitHub] {
            let mut platform_count = 0;
            for (i, strategy) in strategies.iter().enumerate() {
                on_event(SearchEvent::QueryStarted {
                    platform,
                    index: i + 1,
                    total,
                    query: &strategy.query,
                });
                let found = self
                    .search(run, strategy, platform, self.default_limit(platform))
                    .await;
                for c in found {
                    if run.claim_url(&c.url) {
                        platform_count += 1;
                        on_event(SearchEvent::Candidate {
                            candidate: &c,
                            platform_count,
                        });
                        all.push(c);
                    }
                }
                if platform == Platform::Devpost && i + 1 < total && !query_delay.is_zero() {
                    tokio::time::sleep(query_delay).await;
                }
            }
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(name: &str, desc: &str, url: &str) -> RawResult {
        RawResult {
            name: name.into(),
            description: desc.into(),
            url: url.into(),
            metrics: CatalogMetrics::Listing {
                likes: 1,
                comments: 0,
                is_winner: false,
                submission_date: None,
            },
        }
    }

    #[test]
    fn excluded_url_matches_after_normalization() {
        let mut run = SearchRun::new(Some("https://devpost.com/software/foo"));
        let (adm, c) = run.admit(
            Platform::Devpost,
            listing("Foo", "a fact checker", "https://devpost.com/software/foo/?ref=1#top"),
            "q",
            300,
        );
        assert_eq!(adm, Admission::Excluded);
        assert!(c.is_none());
        assert_eq!(run.seen_count(), 0);
    }

    #[test]
    fn first_hash_wins() {
        let mut run = SearchRun::new(None);
        let (a, first) = run.admit(Platform::Devpost, listing("A", "Same  Text", "https://x/a"), "q", 300);
        let (b, _) = run.admit(Platform::Devpost, listing("B", "same text", "https://x/b"), "q", 300);
        assert_eq!(a, Admission::Accepted);
        assert_eq!(b, Admission::Duplicate);
        assert_eq!(first.unwrap().name, "A");
    }

    #[test]
    fn reset_clears_state_between_runs() {
        let mut run = SearchRun::new(Some("https://x/a"));
        run.admit(Platform::Devpost, listing("B", "text", "https://x/b"), "q", 300);
        assert!(!run.claim_url("https://x/a/"));
        run.reset(None);
        assert_eq!(run.seen_count(), 0);
        assert!(run.exclude_url().is_none());
        assert!(run.claim_url("https://x/a"));
        let (adm, _) = run.admit(Platform::Devpost, listing("B", "text", "https://x/b"), "q", 300);
        assert_eq!(adm, Admission::Accepted);
    }

    #[test]
    fn candidate_serializes_flat_metrics() {
        let mut run = SearchRun::new(None);
        let (_, c) = run.admit(Platform::Devpost, listing("A", "desc", "https://x/a"), "q", 300);
        let v = serde_json::to_value(c.unwrap()).unwrap();
        assert_eq!(v["platform"], "Devpost");
        assert_eq!(v["likes"], 1);
        assert_eq!(v["is_winner"], false);
        assert!(v.get("ai_similarity").is_none());
    }
}
