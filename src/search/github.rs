// src/search/github.rs
//! Code-hosting catalog: repository search API, sorted by stars.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{CatalogMetrics, CatalogSource, Platform, RawResult};
use crate::fetch::DynTransport;
use crate::text::decode_entities;

const API_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/vnd.github.v3+json"),
    ("User-Agent", "Mozilla/5.0"),
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
    #[serde(default)]
    full_name: String,
    description: Option<String>,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    language: Option<String>,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    updated_at: String,
}

impl From<Repo> for RawResult {
    fn from(r: Repo) -> Self {
        RawResult {
            name: r.name,
            description: r
                .description
                .map(|d| decode_entities(&d))
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "No description".to_string()),
            url: r.html_url,
            metrics: CatalogMetrics::Code {
                full_name: r.full_name,
                stars: r.stargazers_count,
                language: r.language.unwrap_or_else(|| "Unknown".to_string()),
                created_at: r.created_at,
                updated_at: r.updated_at,
            },
        }
    }
}

pub fn parse_search_response(body: &str) -> Result<Vec<RawResult>, serde_json::Error> {
    let resp: SearchResponse = serde_json::from_str(body)?;
    Ok(resp
        .items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Repo>(item) {
            Ok(repo) => Some(RawResult::from(repo)),
            Err(e) => {
                tracing::debug!(error = %e, "skipping malformed repository item");
                None
            }
        })
        .collect())
}

pub struct GithubSearch {
    transport: DynTransport,
    api: String,
    timeout: Duration,
}

impl GithubSearch {
    pub fn new(transport: DynTransport, api: &str, timeout: Duration) -> Self {
        Self {
            transport,
            api: api.to_string(),
            timeout,
        }
    }

    fn query_url(&self, query: &str, per_page: usize) -> String {
        let per_page = per_page.to_string();
        let params = [
            ("q", query),
            ("sort", "stars"),
            ("order", "desc"),
            ("per_page", per_page.as_str()),
        ];
        match url::Url::parse_with_params(&self.api, &params) {
            Ok(u) => u.to_string(),
            Err(_) => format!("{}?q={query}&sort=stars&order=desc&per_page={per_page}", self.api),
        }
    }
}

#[async_trait]
impl CatalogSource for GithubSearch {
    fn platform(&self) -> Platform {
        Platform::GitHub
    }

    /// `limit` is the number of repositories requested.
    async fn fetch_results(&self, query: &str, limit: usize) -> Vec<RawResult> {
        let url = self.query_url(query, limit);
        let resp = match self.transport.get(&url, API_HEADERS, self.timeout).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "code search failed");
                return Vec::new();
            }
        };
        if resp.status != 200 {
            tracing::warn!(query = %query, status = resp.status, "code search rejected");
            return Vec::new();
        }
        match parse_search_response(&resp.body) {
            Ok(mut results) => {
                results.truncate(limit);
                results
            }
            Err(e) => {
                tracing::warn!(query = %query, error = %e, "code search body unparsable");
                Vec::new()
            }
        }
    }
}
