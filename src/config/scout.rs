// src/config/scout.rs
//! Operational knobs for scraping, search and scoring, loaded from TOML.
//!
//! Resolution order:
//! 1) $SCOUT_CONFIG_PATH
//! 2) config/scout.toml
//! 3) built-in defaults
//!
//! Every field has a default, so a partial file only overrides what it names.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::similarity::FraudRisk;

pub const DEFAULT_SCOUT_CONFIG_PATH: &str = "config/scout.toml";
pub const ENV_SCOUT_CONFIG_PATH: &str = "SCOUT_CONFIG_PATH";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub fetch: FetchConfig,
    pub search: SearchConfig,
    pub scoring: ScoringConfig,
    pub fallback: FallbackPolicy,
    pub ideas: IdeasConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub tab_delay_ms: u64,
    pub project_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub timeout_secs: u64,
    /// Delay between queries within one catalog.
    pub query_delay_ms: u64,
    /// Delay between result pages of the event-listing catalog.
    pub page_delay_ms: u64,
    pub top_strategies: usize,
    pub listing_pages: usize,
    pub code_results: usize,
    pub fetch_submission_dates: bool,
    pub listing_base: String,
    pub code_search_api: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub max_candidates: usize,
    pub word_limit: usize,
    pub max_tokens: u32,
    pub strategy_max_tokens: u32,
}

/// What a similarity run reports when the scorer itself fails.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    pub originality_score: u8,
    pub fraud_risk: FraudRisk,
    pub summary: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdeasConfig {
    pub winners_per_event: usize,
    pub sample_size: usize,
    pub max_tokens: u32,
    pub breakdown_max_tokens: u32,
    pub default_past_events: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    /// Write a plain-text report after every similarity run.
    pub save_reports: bool,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            search: SearchConfig::default(),
            scoring: ScoringConfig::default(),
            fallback: FallbackPolicy::default(),
            ideas: IdeasConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            tab_delay_ms: 1_000,
            project_delay_ms: 2_000,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            query_delay_ms: 1_000,
            page_delay_ms: 2_000,
            top_strategies: 4,
            listing_pages: 1,
            code_results: 3,
            fetch_submission_dates: false,
            listing_base: "https://devpost.com".to_string(),
            code_search_api: "https://api.github.com/search/repositories".to_string(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_candidates: 20,
            word_limit: crate::text::WORD_LIMIT,
            max_tokens: 8_000,
            strategy_max_tokens: 2_000,
        }
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            originality_score: 50,
            fraud_risk: FraudRisk::Unknown,
            summary: "AI analysis failed".to_string(),
            recommendation: "Manual review required".to_string(),
        }
    }
}

impl Default for IdeasConfig {
    fn default() -> Self {
        Self {
            winners_per_event: 25,
            sample_size: 100,
            max_tokens: 8_000,
            breakdown_max_tokens: 8_000,
            default_past_events: [
                "https://cal-hacks-10-0.devpost.com",
                "https://hack-mit-2023.devpost.com",
                "https://treehacks-2023.devpost.com",
                "https://pennapps-xxiii.devpost.com",
                "https://hacktheburghx.devpost.com",
                "https://hackprinceton-spring-2024.devpost.com",
                "https://hackharvard-2023.devpost.com",
                "https://hackru-spring-2024.devpost.com",
                "https://technica-2023.devpost.com",
                "https://hacknyu-2023.devpost.com",
                "https://hackrpi-2023.devpost.com",
                "https://hackwestern-x.devpost.com",
                "https://boilermake-x.devpost.com",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("hackathon-data"),
            reports_dir: PathBuf::from("reports"),
            save_reports: false,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

impl ScoutConfig {
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading scout config from {}", path.display()))?;
        let cfg: ScoutConfig = toml::from_str(&content)
            .with_context(|| format!("parsing scout config {}", path.display()))?;
        Ok(cfg.sanitized())
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SCOUT_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("SCOUT_CONFIG_PATH points to non-existent path"));
        }
        let p = PathBuf::from(DEFAULT_SCOUT_CONFIG_PATH);
        if p.exists() {
            return Self::load_from(&p);
        }
        Ok(Self::default())
    }

    /// Config with every delay zeroed; used by tests and dry runs.
    pub fn without_delays(mut self) -> Self {
        self.fetch.tab_delay_ms = 0;
        self.fetch.project_delay_ms = 0;
        self.search.query_delay_ms = 0;
        self.search.page_delay_ms = 0;
        self
    }

    fn sanitized(mut self) -> Self {
        self.fallback.originality_score = self.fallback.originality_score.min(100);
        if self.scoring.word_limit == 0 {
            self.scoring.word_limit = crate::text::WORD_LIMIT;
        }
        if self.scoring.max_candidates == 0 {
            self.scoring.max_candidates = 20;
        }
        self.search.listing_base = self.search.listing_base.trim_end_matches('/').to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn partial_file_keeps_defaults() {
        let toml = r#"
            [search]
            top_strategies = 6

            [fallback]
            originality_score = 140
            fraud_risk = "MEDIUM"
        "#;
        let cfg: ScoutConfig = toml::from_str(toml).unwrap();
        let cfg = cfg.sanitized();
        assert_eq!(cfg.search.top_strategies, 6);
        assert_eq!(cfg.search.listing_pages, 1);
        assert_eq!(cfg.fetch.timeout_secs, 10);
        assert_eq!(cfg.fallback.originality_score, 100);
        assert_eq!(cfg.fallback.fraud_risk, FraudRisk::Medium);
    }

    #[serial_test::serial]
    #[test]
    fn env_path_wins_and_missing_env_path_errors() {
        let tmp = tempfile::tempdir().unwrap();
        let p = tmp.path().join("scout.toml");
        fs::write(&p, "[scoring]\nmax_candidates = 7\n").unwrap();

        env::set_var(ENV_SCOUT_CONFIG_PATH, p.display().to_string());
        let cfg = ScoutConfig::load_default().unwrap();
        assert_eq!(cfg.scoring.max_candidates, 7);

        env::set_var(ENV_SCOUT_CONFIG_PATH, tmp.path().join("nope.toml"));
        assert!(ScoutConfig::load_default().is_err());
        env::remove_var(ENV_SCOUT_CONFIG_PATH);
    }
}
