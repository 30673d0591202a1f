// src/event.rs
//! Event-level scraping: naming, the full discovery pass, rules capture and
//! gallery lookup.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::chain::first_accepted_async;
use crate::classify::{self, SectionKind};
use crate::config::scout::FetchConfig;
use crate::extract::{extract_project, extract_projects, extract_section, ProjectDetail, ProjectEntry, ProjectsInfo, SectionRecord};
use crate::fetch::{Document, PageFetcher};
use crate::resolve::{TabMap, TabResolver};

/// Sections captured as the rules of an upcoming event.
pub const RULES_KINDS: [SectionKind; 4] = [
    SectionKind::Overview,
    SectionKind::Rules,
    SectionKind::Prizes,
    SectionKind::Schedule,
];

/// Gallery suffixes tried, in order, when collecting past winners.
pub const GALLERY_PATHS: &[&str] = &["/project-gallery", "/submissions", "/projects"];

const FALLBACK_SLUG: &str = "hackathon";

/// Event URL without query string or trailing slash.
pub fn clean_event_url(url: &str) -> String {
    url.trim()
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .trim_end_matches('/')
        .to_string()
}

/// Filesystem-safe name for an event, taken from its listing sub-domain.
pub fn event_slug(url: &str) -> String {
    let clean = clean_event_url(url)
        .replace("https://", "")
        .replace("http://", "")
        .replace("www.", "");
    let Some((sub, _)) = clean.split_once(".devpost.com") else {
        return FALLBACK_SLUG.to_string();
    };
    let sub = sub.split('/').next().unwrap_or("");
    let slug: String = sub
        .replace(['-', '.'], "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

// ------------------------------------------------------------
// Records
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventScrape {
    pub url: String,
    pub event_name: String,
    pub sections: BTreeMap<SectionKind, SectionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub title: String,
    pub headings_count: usize,
    pub links_count: usize,
    pub text_length: usize,
    pub key_headings: Vec<String>,
    pub main_topics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinnersAnalysis {
    pub total_projects: usize,
    pub winning_projects_count: usize,
    pub winning_project_titles: Vec<String>,
    pub common_technologies: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSummary {
    pub name: String,
    pub url: String,
    pub scraped_at: String,
    pub total_sections: usize,
    pub available_sections: Vec<SectionKind>,
    pub content: BTreeMap<SectionKind, SectionSummary>,
    pub winners: Option<WinnersAnalysis>,
}

pub fn summarize_section(record: &SectionRecord) -> SectionSummary {
    SectionSummary {
        title: record.title.clone(),
        headings_count: record.headings.len(),
        links_count: record.links.len(),
        text_length: record.text_content.chars().count(),
        key_headings: record.headings.iter().take(5).map(|h| h.text.clone()).collect(),
        main_topics: classify::main_topics(&record.text_content),
    }
}

/// Technology mentions across winning entries, most frequent first.
pub fn analyze_technologies(winners: &[ProjectEntry]) -> Vec<(String, usize)> {
    classify::technology_histogram(winners.iter().map(|p| p.title.as_str()))
}

pub fn analyze_winners(info: &ProjectsInfo) -> WinnersAnalysis {
    WinnersAnalysis {
        total_projects: info.all_projects.len(),
        winning_projects_count: info.winning_projects.len(),
        winning_project_titles: info.winning_projects.iter().map(|p| p.title.clone()).collect(),
        common_technologies: analyze_technologies(&info.winning_projects),
    }
}

impl EventScrape {
    pub fn summary(&self) -> EventSummary {
        let winners = self
            .sections
            .get(&SectionKind::Projects)
            .and_then(|r| r.projects_info.as_ref())
            .map(analyze_winners);
        EventSummary {
            name: self.event_name.clone(),
            url: self.url.clone(),
            scraped_at: Utc::now().to_rfc3339(),
            total_sections: self.sections.len(),
            available_sections: self.sections.keys().copied().collect(),
            content: self
                .sections
                .iter()
                .map(|(k, r)| (*k, summarize_section(r)))
                .collect(),
            winners,
        }
    }
}

/// Text and structure captured for one rules section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesSection {
    pub text: String,
    pub structured: SectionRecord,
}

/// Persisted as `rules.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesDocument {
    pub url: String,
    pub event_name: String,
    pub scraped_at: String,
    pub rules_data: BTreeMap<String, RulesSection>,
}

impl RulesDocument {
    pub fn section_text(&self, kind: SectionKind) -> &str {
        self.rules_data
            .get(kind.as_str())
            .map(|s| s.text.as_str())
            .unwrap_or("")
    }
}

// ------------------------------------------------------------
// Scraper
// ------------------------------------------------------------

fn gallery_projects(doc: &Document) -> Option<ProjectsInfo> {
    doc.is_valid()
        .then(|| extract_projects(&doc.parse(), &doc.url))
        .filter(|info| !info.is_empty())
}

async fn pause(d: Duration) {
    if !d.is_zero() {
        tokio::time::sleep(d).await;
    }
}

#[derive(Clone)]
pub struct EventScraper {
    fetcher: PageFetcher,
    tab_delay: Duration,
    project_delay: Duration,
    word_limit: usize,
}

impl EventScraper {
    pub fn new(fetcher: PageFetcher, cfg: &FetchConfig, word_limit: usize) -> Self {
        Self {
            fetcher,
            tab_delay: Duration::from_millis(cfg.tab_delay_ms),
            project_delay: Duration::from_millis(cfg.project_delay_ms),
            word_limit,
        }
    }

    pub fn fetcher(&self) -> &PageFetcher {
        &self.fetcher
    }

    pub async fn resolve(&self, base_url: &str) -> TabMap {
        TabResolver::new(self.fetcher.clone()).resolve(base_url).await
    }

    /// Resolve every section, then fetch and extract each in map order.
    pub async fn scrape_event(&self, base_url: &str) -> EventScrape {
        let base = clean_event_url(base_url);
        let tabs = self.resolve(&base).await;
        let mut sections = BTreeMap::new();

        for (kind, path) in &tabs {
            match self.fetcher.fetch(&format!("{base}{path}")).await {
                Some(doc) => {
                    sections.insert(*kind, extract_section(&doc, *kind, path));
                }
                None => tracing::info!(kind = %kind, path = %path, "resolved section did not load"),
            }
            pause(self.tab_delay).await;
        }

        tracing::info!(url = %base, sections = sections.len(), "event scraped");
        EventScrape {
            event_name: event_slug(&base),
            url: base,
            sections,
        }
    }

    /// Overview, rules, prizes and schedule, each from its resolved path or
    /// `/<kind>` when unresolved. Sections that do not validate are skipped.
    pub async fn scrape_rules(&self, event_url: &str) -> RulesDocument {
        let base = clean_event_url(event_url);
        let tabs = self.resolve(&base).await;
        let mut rules_data = BTreeMap::new();

        for kind in RULES_KINDS {
            let path = tabs
                .get(&kind)
                .cloned()
                .unwrap_or_else(|| format!("/{}", kind.as_str()));
            match self.fetcher.fetch_valid(&format!("{base}{path}")).await {
                Some(doc) => {
                    let structured = extract_section(&doc, kind, &path);
                    rules_data.insert(
                        kind.as_str().to_string(),
                        RulesSection {
                            text: structured.text_content.clone(),
                            structured,
                        },
                    );
                    tracing::info!(kind = %kind, "rules section captured");
                }
                None => tracing::info!(kind = %kind, path = %path, "rules section unavailable"),
            }
        }

        RulesDocument {
            event_name: event_slug(&base),
            url: base,
            scraped_at: Utc::now().to_rfc3339(),
            rules_data,
        }
    }

    /// First gallery page that validates and lists any project.
    pub async fn find_gallery(&self, event_url: &str) -> Option<ProjectsInfo> {
        let base = clean_event_url(event_url);
        let fetcher = &self.fetcher;
        first_accepted_async(
            GALLERY_PATHS.to_vec(),
            |path| {
                let url = format!("{base}{path}");
                async move { fetcher.fetch(&url).await.and_then(|doc| gallery_projects(&doc)) }
            },
            |_| true,
        )
        .await
        .map(|(path, info)| {
            tracing::info!(url = %base, path, projects = info.entries().len(), "gallery found");
            info
        })
    }

    /// Deep-extract up to `limit` winners in order, pausing between pages.
    /// `on_extracted` sees each success with its 1-based position.
    pub async fn extract_winners<F>(
        &self,
        winners: &[ProjectEntry],
        limit: usize,
        mut on_extracted: F,
    ) -> Vec<ProjectDetail>
    where
        F: FnMut(usize, &ProjectEntry, &ProjectDetail),
    {
        let mut out = Vec::new();
        for (i, entry) in winners.iter().take(limit).enumerate() {
            if let Some(detail) = extract_project(&self.fetcher, &entry.url, &entry.title, self.word_limit).await {
                on_extracted(i + 1, entry, &detail);
                out.push(detail);
            }
            pause(self.project_delay).await;
        }
        out
    }
}
