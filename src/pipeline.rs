// src/pipeline.rs
//! The two user-facing runs: similarity check for a submitted project, and
//! idea generation for an upcoming event. Both report progress through a
//! `ProgressSink` and return their final result; error events are the
//! caller's job.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::ScoutConfig;
use crate::error::{Result, ScoutError};
use crate::event::{clean_event_url, event_slug, EventScrape, EventScraper, RulesDocument};
use crate::extract::{extract_project_detail, ProjectDetail};
use crate::fetch::{DynTransport, PageFetcher};
use crate::ideas::{generate_breakdown, generate_ideas, ideas_header, sample_winners, Idea, RulesSummary};
use crate::llm::DynModel;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::report::render_report;
use crate::search::{CandidateProject, DevpostSearch, GithubSearch, SearchEngine, SearchEvent, SearchRun};
use crate::similarity::{FraudRisk, Scorer, SimilarityAnalysis};
use crate::store::ArtifactStore;
use crate::strategy::generate_strategies;
use crate::text::{truncate_words, word_count};

pub const TARGET_FALLBACK_TITLE: &str = "Target Project";

const MIN_TARGET_WORDS: usize = 10;
const PLACEHOLDER_DESCRIPTIONS: [&str; 3] = ["devpost", "github", "hackathon"];

static METRICS_DESCRIBED: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();

fn ensure_metrics_described() {
    METRICS_DESCRIBED.get_or_init(|| {
        metrics::describe_counter!("similarity_runs_total", "Similarity checks, by outcome.");
        metrics::describe_counter!("idea_runs_total", "Idea generation runs, by outcome.");
        metrics::describe_histogram!("similarity_candidates", "Candidates collected per similarity check.");
    });
}

fn outcome_label<T>(r: &Result<T>) -> &'static str {
    match r {
        Ok(_) => "ok",
        Err(e) => e.kind().code(),
    }
}

/// Similarity URL without query, fragment or trailing slash.
pub fn clean_project_url(url: &str) -> String {
    clean_event_url(url)
}

/// Gate a scraped target page before any search or model call. Returns the
/// description to analyse, capped to the word limit.
pub fn validate_target(detail: Option<&ProjectDetail>, word_limit: usize) -> Result<String> {
    let Some(detail) = detail else {
        return Err(ScoutError::Unreachable("the Devpost project".to_string()));
    };
    let description = detail.summary_text().trim();
    if description.is_empty() {
        return Err(ScoutError::InsufficientInput(
            "Invalid link. Project description not found on this page".to_string(),
        ));
    }
    let lower = description.to_lowercase();
    if PLACEHOLDER_DESCRIPTIONS.contains(&lower.as_str()) {
        return Err(ScoutError::InsufficientInput(
            "Invalid project description. The scraper only found the platform name. Please check the Devpost URL.".to_string(),
        ));
    }
    if word_count(description) < MIN_TARGET_WORDS {
        return Err(ScoutError::InsufficientInput(
            "Project description is too short or invalid. Please ensure the Devpost project has a proper description (at least 10 words).".to_string(),
        ));
    }
    Ok(truncate_words(description, word_limit))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityResult {
    pub fraud_risk: FraudRisk,
    pub originality_score: u8,
    pub total_projects: usize,
    pub submission_date: Option<String>,
    pub project_name: String,
}

#[derive(Debug, Clone)]
pub struct SimilarityOutcome {
    pub result: SimilarityResult,
    pub analysis: SimilarityAnalysis,
    /// Every collected candidate; the scored prefix carries model scores.
    pub candidates: Vec<CandidateProject>,
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdeasOutcome {
    pub output_dir: String,
    pub ideas_file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Breakdown {
    pub breakdown: String,
    pub has_schedule: bool,
}

/// Shared service object behind the HTTP API.
#[derive(Clone)]
pub struct Blueprint {
    cfg: Arc<ScoutConfig>,
    model: DynModel,
    scraper: EventScraper,
    engine: SearchEngine,
    scorer: Scorer,
    store: ArtifactStore,
}

impl Blueprint {
    pub fn new(cfg: ScoutConfig, model: DynModel, transport: DynTransport) -> Self {
        let fetcher = PageFetcher::new(transport.clone(), cfg.fetch.timeout());
        let listing = DevpostSearch::new(
            transport.clone(),
            &cfg.search.listing_base,
            cfg.search.timeout(),
            Duration::from_millis(cfg.search.page_delay_ms),
        );
        let code = GithubSearch::new(transport, &cfg.search.code_search_api, cfg.search.timeout());
        let engine = SearchEngine::new(
            Arc::new(listing),
            Arc::new(code),
            fetcher.clone(),
            cfg.search.clone(),
            cfg.scoring.word_limit,
        );
        Self {
            scraper: EventScraper::new(fetcher, &cfg.fetch, cfg.scoring.word_limit),
            scorer: Scorer::new(model.clone(), cfg.scoring.clone()),
            store: ArtifactStore::new(&cfg.storage),
            engine,
            model,
            cfg: Arc::new(cfg),
        }
    }

    pub fn config(&self) -> &ScoutConfig {
        &self.cfg
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn scraper(&self) -> &EventScraper {
        &self.scraper
    }

    /// Full discovery pass over one event.
    pub async fn scrape_event(&self, url: &str) -> EventScrape {
        self.scraper.scrape_event(url).await
    }

    // ------------------------------------------------------------
    // Similarity check
    // ------------------------------------------------------------

    pub async fn similarity_check(&self, url: &str, sink: &ProgressSink) -> Result<SimilarityOutcome> {
        ensure_metrics_described();
        let out = self.run_similarity(url, sink).await;
        metrics::counter!("similarity_runs_total", "outcome" => outcome_label(&out)).increment(1);
        out
    }

    async fn run_similarity(&self, url: &str, sink: &ProgressSink) -> Result<SimilarityOutcome> {
        let url = clean_project_url(url);
        sink.status("Fetching project details...", "Loading Devpost project");

        let Some(doc) = self.scraper.fetcher().fetch(&url).await else {
            return Err(ScoutError::Unreachable("the Devpost project".to_string()));
        };
        if !doc.is_valid() {
            return Err(ScoutError::InvalidContent(url));
        }
        let target = extract_project_detail(&doc, TARGET_FALLBACK_TITLE, self.cfg.scoring.word_limit);
        let description = validate_target(Some(&target), self.cfg.scoring.word_limit)?;
        let project_name = target.title.clone();
        sink.status(format!("Analyzing: {project_name}"), "Initializing detector");

        let mut run = SearchRun::new(Some(&url));

        sink.status("Generating project-specific search strategies", "Analyzing description");
        let mut strategies =
            generate_strategies(self.model.as_ref(), &description, self.cfg.scoring.strategy_max_tokens).await?;
        sink.status(
            "Strategies generated",
            format!("Created {} unique queries for this project", strategies.len()),
        );
        strategies.truncate(self.cfg.search.top_strategies.max(1));

        let candidates = self
            .engine
            .search_all(&mut run, &strategies, |ev| match ev {
                SearchEvent::QueryStarted {
                    platform,
                    index,
                    total,
                    query,
                } => sink.status(
                    format!("Searching {}", platform.as_str()),
                    format!("Strategy {index}/{total}: {query}"),
                ),
                SearchEvent::Candidate {
                    candidate,
                    platform_count,
                } => sink.emit(ProgressEvent::Project {
                    project: candidate.clone(),
                    source_progress: format!("{}: {platform_count}", candidate.platform.as_str()),
                }),
            })
            .await;
        metrics::histogram!("similarity_candidates").record(candidates.len() as f64);
        sink.status("AI analyzing similarities...", format!("Found {} unique projects", candidates.len()));

        let (analysis, scored) = if candidates.is_empty() {
            tracing::info!(project = %project_name, "no similar projects found, skipping scorer");
            (SimilarityAnalysis::no_matches(), Vec::new())
        } else {
            let n = candidates.len().min(self.cfg.scoring.max_candidates);
            sink.status("Running AI similarity analysis...", format!("Analyzing {n} projects"));
            let scored = self
                .scorer
                .score_or_fallback(&description, &candidates, &self.cfg.fallback)
                .await?;
            let total = scored.candidates.len();
            for (i, c) in scored.candidates.iter().enumerate() {
                if c.ai_similarity.is_some() {
                    sink.emit(ProgressEvent::ProjectUpdate {
                        project_update: c.clone(),
                        analysis_progress: format!("{}/{total}", i + 1),
                    });
                }
            }
            (scored.analysis, scored.candidates)
        };

        // Scored prefix replaces the first candidates; the rest stay unscored.
        let mut all = scored;
        all.extend(candidates.iter().skip(all.len()).cloned());

        let result = SimilarityResult {
            fraud_risk: analysis.fraud_risk,
            originality_score: analysis.originality_score,
            total_projects: candidates.len(),
            submission_date: target.submission_date.clone(),
            project_name: project_name.clone(),
        };

        let report_path = if self.cfg.storage.save_reports {
            let text = render_report(&project_name, &description, &all, &analysis);
            match self.store.save_report(&project_name, &text) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(error = %e, "could not save similarity report");
                    None
                }
            }
        } else {
            None
        };

        sink.emit(ProgressEvent::Complete {
            status: "Complete".to_string(),
            result: serde_json::to_value(&result)?,
        });
        tracing::info!(
            project = %project_name,
            risk = %result.fraud_risk,
            originality = result.originality_score,
            total = result.total_projects,
            "similarity check finished"
        );

        Ok(SimilarityOutcome {
            result,
            analysis,
            candidates: all,
            report_path,
        })
    }

    // ------------------------------------------------------------
    // Idea generation
    // ------------------------------------------------------------

    /// Cached `rules.json`, or a fresh scrape saved for next time.
    pub async fn rules_for(&self, event_url: &str) -> RulesDocument {
        let slug = event_slug(event_url);
        if let Some(doc) = self.store.load_rules(&slug) {
            tracing::info!(event = %slug, "using cached rules");
            return doc;
        }
        let doc = self.scraper.scrape_rules(event_url).await;
        if !doc.rules_data.is_empty() {
            if let Err(e) = self.store.save_rules(&slug, &doc) {
                tracing::warn!(event = %slug, error = %e, "could not cache rules");
            }
        }
        doc
    }

    /// Cached winners of a past event, or a gallery scrape persisted one
    /// file per project.
    pub async fn past_winners(&self, event_url: &str) -> Vec<ProjectDetail> {
        let slug = event_slug(event_url);
        if let Some(cached) = self.store.load_winners(&slug) {
            tracing::info!(event = %slug, projects = cached.len(), "using cached winners");
            return cached;
        }

        let Some(gallery) = self.scraper.find_gallery(event_url).await else {
            tracing::warn!(event = %slug, "no project gallery found");
            return Vec::new();
        };

        let store = &self.store;
        let winners = self
            .scraper
            .extract_winners(
                &gallery.winning_projects,
                self.cfg.ideas.winners_per_event,
                |i, _entry, detail| {
                    if let Err(e) = store.save_winner(&slug, i, &detail.title, detail) {
                        tracing::warn!(event = %slug, error = %e, "could not save winner");
                    }
                },
            )
            .await;
        self.store.remove_if_empty(&slug);
        tracing::info!(event = %slug, winners = winners.len(), "past winners scraped");
        winners
    }

    pub async fn generate(&self, event_url: &str, past_events: &[String], sink: &ProgressSink) -> Result<IdeasOutcome> {
        ensure_metrics_described();
        let out = self.run_generate(event_url, past_events, sink).await;
        metrics::counter!("idea_runs_total", "outcome" => outcome_label(&out)).increment(1);
        out
    }

    async fn run_generate(&self, event_url: &str, past_events: &[String], sink: &ProgressSink) -> Result<IdeasOutcome> {
        let event_url = clean_event_url(event_url);
        let slug = event_slug(&event_url);

        sink.status("Scraping new hackathon rules...", "Extracting rules and requirements");
        let rules = self.rules_for(&event_url).await;
        if rules.rules_data.is_empty() {
            return Err(ScoutError::Unreachable("the hackathon page".to_string()));
        }
        sink.status("Rules scraped successfully", "Found hackathon requirements");

        let past: Vec<String> = if past_events.iter().all(|u| u.trim().is_empty()) {
            sink.status(
                "Using default past hackathons...",
                format!("Selecting {} popular hackathons", self.cfg.ideas.default_past_events.len()),
            );
            self.cfg.ideas.default_past_events.clone()
        } else {
            past_events.iter().filter(|u| !u.trim().is_empty()).cloned().collect()
        };

        sink.status("Scraping past hackathon winners...", format!("Analyzing {} hackathons", past.len()));
        let mut winners = Vec::new();
        for (i, url) in past.iter().enumerate() {
            sink.status(format!("Scraping hackathon {}/{}", i + 1, past.len()), format!("Analyzing {url}"));
            winners.extend(self.past_winners(url).await);
        }

        sink.status("Generating ideas...", "Synthesizing winning patterns");
        let sample = {
            let mut rng = rand::rng();
            sample_winners(&winners, self.cfg.ideas.sample_size, &mut rng)
        };
        let summary = RulesSummary::from(&rules);
        let text = generate_ideas(self.model.as_ref(), &summary, &sample, self.cfg.ideas.max_tokens).await?;

        let contents = format!("{}{text}", ideas_header(&event_url, sample.len(), past.len()));
        let path = self.store.save_ideas(&slug, &contents)?;

        let outcome = IdeasOutcome {
            output_dir: self.store.event_dir(&slug).display().to_string(),
            ideas_file: path.display().to_string(),
        };
        sink.emit(ProgressEvent::Complete {
            status: "Complete!".to_string(),
            result: serde_json::to_value(&outcome)?,
        });
        Ok(outcome)
    }

    /// Stored ideas file parsed into records; `None` when it is missing.
    pub fn load_ideas(&self, path: &str) -> Option<Vec<Idea>> {
        self.store.read_artifact(path).map(|t| crate::ideas::parse_ideas(&t))
    }

    pub async fn breakdown(&self, idea: &Idea, event_folder: Option<&str>) -> Result<Breakdown> {
        let schedule = event_folder.and_then(|f| self.store.schedule_text(f));
        let breakdown = generate_breakdown(
            self.model.as_ref(),
            idea,
            schedule.as_deref(),
            self.cfg.ideas.breakdown_max_tokens,
        )
        .await?;
        Ok(Breakdown {
            breakdown,
            has_schedule: schedule.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn detail(desc: &str) -> ProjectDetail {
        ProjectDetail {
            title: "T".into(),
            description: desc.into(),
            ..Default::default()
        }
    }

    #[test]
    fn gate_rejects_in_order() {
        let err = validate_target(None, 300).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unreachable);
        assert_eq!(
            err.to_string(),
            "Invalid link. Unable to access the Devpost project (403/404 error or invalid URL)"
        );

        let err = validate_target(Some(&detail("")), 300).unwrap_err();
        assert!(err.to_string().contains("description not found"));

        let err = validate_target(Some(&detail("only five words right here")), 300).unwrap_err();
        assert!(err.to_string().contains("at least 10 words"));
        assert_eq!(err.kind(), ErrorKind::InsufficientInput);
    }

    #[test]
    fn placeholder_description_names_the_platform() {
        for placeholder in ["Devpost", " github ", "HACKATHON"] {
            let err = validate_target(Some(&detail(placeholder)), 300).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InsufficientInput);
            assert!(err.to_string().contains("only found the platform name"), "{placeholder}");
        }
    }

    #[test]
    fn gate_falls_back_to_tagline_and_caps_words() {
        let d = ProjectDetail {
            tagline: "a tagline that is long enough to pass the ten word gate".into(),
            ..Default::default()
        };
        assert!(validate_target(Some(&d), 300).is_ok());

        let long = "word ".repeat(400);
        let out = validate_target(Some(&detail(&long)), 300).unwrap();
        assert_eq!(word_count(&out), 300);
    }
}
