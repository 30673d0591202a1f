// src/similarity.rs
//! Similarity scorer: one model call rates the submitted project against up
//! to `max_candidates` search hits.
//!
//! Scores are merged back onto candidates by the short id each candidate
//! carries in the prompt. Positional merge is only a fallback for responses
//! that echo no ids and have exactly one entry per submitted candidate.

use std::collections::HashMap;
use std::fmt::{self, Write as _};

use serde::{Deserialize, Deserializer, Serialize};

use crate::config::scout::{FallbackPolicy, ScoringConfig};
use crate::error::{Result, ScoutError};
use crate::llm::decode::{decode_as, DecodeError};
use crate::llm::{DynModel, LlmError};
use crate::search::{CandidateProject, CatalogMetrics};
use crate::text::{anon_id, truncate_words};

pub const NOT_ANALYZED: &str = "Not analyzed";
pub const NO_MATCH_ORIGINALITY: u8 = 95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FraudRisk {
    High,
    Medium,
    Low,
    Unknown,
}

impl FraudRisk {
    pub fn as_str(self) -> &'static str {
        match self {
            FraudRisk::High => "HIGH",
            FraudRisk::Medium => "MEDIUM",
            FraudRisk::Low => "LOW",
            FraudRisk::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for FraudRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Models are loose with casing; anything unrecognized is UNKNOWN.
impl<'de> Deserialize<'de> for FraudRisk {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "HIGH" => FraudRisk::High,
            "MEDIUM" => FraudRisk::Medium,
            "LOW" => FraudRisk::Low,
            _ => FraudRisk::Unknown,
        })
    }
}

/// Accepts any JSON number and clamps it into 0..=100.
fn de_score<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u8, D::Error> {
    let v = f64::deserialize(d)?;
    Ok(if v.is_finite() { v.round().clamp(0.0, 100.0) as u8 } else { 0 })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "de_score")]
    pub similarity: u8,
    #[serde(default, deserialize_with = "de_score")]
    pub problem_score: u8,
    #[serde(default, deserialize_with = "de_score")]
    pub solution_score: u8,
    #[serde(default, deserialize_with = "de_score")]
    pub implementation_score: u8,
    #[serde(default, deserialize_with = "de_score")]
    pub use_case_score: u8,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityAnalysis {
    #[serde(default)]
    pub project_scores: Vec<ProjectScore>,
    pub fraud_risk: FraudRisk,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(deserialize_with = "de_score")]
    pub originality_score: u8,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub recommendation: String,
}

impl SimilarityAnalysis {
    /// Verdict when search found nothing to compare against.
    pub fn no_matches() -> Self {
        Self {
            project_scores: Vec::new(),
            fraud_risk: FraudRisk::Low,
            red_flags: Vec::new(),
            originality_score: NO_MATCH_ORIGINALITY,
            summary: "No similar projects found".to_string(),
            recommendation: "No action needed".to_string(),
        }
    }

    pub fn from_policy(policy: &FallbackPolicy) -> Self {
        Self {
            project_scores: Vec::new(),
            fraud_risk: policy.fraud_risk,
            red_flags: Vec::new(),
            originality_score: policy.originality_score,
            summary: policy.summary.clone(),
            recommendation: policy.recommendation.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeReport {
    pub matched: usize,
    pub unmatched: usize,
    pub positional: bool,
}

fn mark_unanalyzed(c: &mut CandidateProject) {
    c.ai_similarity = Some(0);
    c.ai_reasoning = Some(NOT_ANALYZED.to_string());
}

fn apply(c: &mut CandidateProject, s: &ProjectScore) {
    c.ai_similarity = Some(s.similarity);
    c.ai_reasoning = Some(s.reasoning.clone());
}

/// Attach scores to candidates, by id when the response has ids.
pub fn merge_scores(candidates: &mut [CandidateProject], scores: &[ProjectScore]) -> MergeReport {
    let has_ids = scores.iter().any(|s| s.id.as_deref().is_some_and(|i| !i.trim().is_empty()));

    if !has_ids {
        if scores.len() == candidates.len() {
            for (c, s) in candidates.iter_mut().zip(scores) {
                apply(c, s);
            }
            return MergeReport {
                matched: candidates.len(),
                unmatched: 0,
                positional: true,
            };
        }
        tracing::warn!(
            submitted = candidates.len(),
            returned = scores.len(),
            "scores carry no ids and counts differ, leaving candidates unscored"
        );
        candidates.iter_mut().for_each(mark_unanalyzed);
        return MergeReport {
            matched: 0,
            unmatched: candidates.len(),
            positional: false,
        };
    }

    let by_id: HashMap<&str, &ProjectScore> = scores
        .iter()
        .filter_map(|s| s.id.as_deref().map(|i| (i.trim(), s)))
        .collect();

    let mut matched = 0;
    for c in candidates.iter_mut() {
        match by_id.get(c.id()) {
            Some(s) => {
                apply(c, s);
                matched += 1;
            }
            None => mark_unanalyzed(c),
        }
    }
    let unmatched = candidates.len() - matched;
    if unmatched > 0 {
        tracing::warn!(matched, unmatched, "model skipped some candidates");
    }
    MergeReport {
        matched,
        unmatched,
        positional: false,
    }
}

pub fn candidate_lines(candidates: &[CandidateProject]) -> String {
    let mut out = String::new();
    for (i, c) in candidates.iter().enumerate() {
        let _ = writeln!(out, "\n{}. [id: {}] [{}] {}", i + 1, c.id(), c.platform.as_str(), c.name);
        let _ = writeln!(out, "   Desc: {}", c.description);
        let _ = match &c.metrics {
            CatalogMetrics::Code {
                stars,
                language,
                created_at,
                ..
            } => writeln!(out, "   Stars: {stars}, Lang: {language}, Created: {created_at}"),
            CatalogMetrics::Listing {
                likes, is_winner, ..
            } => writeln!(out, "   Likes: {likes}, Winner: {is_winner}"),
        };
    }
    out
}

pub fn scoring_prompt(description: &str, candidates: &[CandidateProject]) -> String {
    let projects = candidate_lines(candidates);
    format!(
        r#"You are an expert in plagiarism detection and semantic similarity. Judge the CORE INNOVATION, not shared keywords.

SUBMITTED PROJECT:
{description}

CANDIDATE PROJECTS:
{projects}

Keyword overlap alone is not similarity. Score every candidate on four independent dimensions, each 0-100:

1. PROBLEM (weight 35%): is it the same pain point?
2. SOLUTION (weight 40%): is the core approach or architecture the same?
3. IMPLEMENTATION (weight 15%): same stack and technical decisions? Common stacks alone are not suspicious.
4. USE CASE (weight 10%): same audience and niche?

Final similarity is the weighted average, then corrected:
- project older than 2 years: minus 15
- saturated domain (chatbots, todo apps): minus 10
- same problem but different solution: at most 45
- keywords match but problem and solution differ: at most 30

Fraud risk:
- HIGH: at least 2 candidates above 80 with the same problem and solution
- MEDIUM: at least 1 candidate above 75, or 3 or more above 60 with the same problem
- LOW: otherwise

Copy each candidate's id exactly into its score entry. Respond with JSON only:
{{
  "project_scores": [
    {{
      "id": "candidate id",
      "name": "...",
      "similarity": 0-100,
      "problem_score": 0-100,
      "solution_score": 0-100,
      "implementation_score": 0-100,
      "use_case_score": 0-100,
      "reasoning": "Problem: same/different. Solution: same/different. Why the score."
    }}
  ],
  "fraud_risk": "HIGH/MEDIUM/LOW",
  "red_flags": ["specific concern"],
  "originality_score": 0-100,
  "summary": "verdict with evidence",
  "recommendation": "action"
}}"#
    )
}

/// Analysis plus the candidates that were actually submitted, scored.
#[derive(Debug, Clone)]
pub struct Scored {
    pub analysis: SimilarityAnalysis,
    pub candidates: Vec<CandidateProject>,
}

static METRICS_DESCRIBED: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();

fn ensure_metrics_described() {
    METRICS_DESCRIBED.get_or_init(|| {
        metrics::describe_counter!(
            "similarity_fallback_total",
            "Similarity runs answered with the configured fallback analysis."
        );
    });
}

#[derive(Clone)]
pub struct Scorer {
    model: DynModel,
    cfg: ScoringConfig,
}

impl Scorer {
    pub fn new(model: DynModel, cfg: ScoringConfig) -> Self {
        Self { model, cfg }
    }

    /// Candidates actually sent to the model: the first `max_candidates`,
    /// descriptions re-capped.
    pub fn prepare(&self, candidates: &[CandidateProject]) -> Vec<CandidateProject> {
        candidates
            .iter()
            .take(self.cfg.max_candidates)
            .cloned()
            .map(|mut c| {
                c.description = truncate_words(&c.description, self.cfg.word_limit);
                c
            })
            .collect()
    }

    /// One model call. Every failure is returned to the caller.
    pub async fn score(&self, description: &str, candidates: &[CandidateProject]) -> Result<Scored> {
        let description = truncate_words(description, self.cfg.word_limit);
        let mut top = self.prepare(candidates);
        let prompt = scoring_prompt(&description, &top);

        let raw = self.model.complete(&prompt, self.cfg.max_tokens).await?;
        let analysis: SimilarityAnalysis = decode_as(&raw).map_err(|e| match e {
            DecodeError::Refusal(s) => ScoutError::ModelRefusal(format!(
                "Invalid project description for analysis - the model could not process it ({s})"
            )),
            other => ScoutError::from(other),
        })?;

        let report = merge_scores(&mut top, &analysis.project_scores);
        tracing::info!(
            desc_id = %anon_id(&description),
            submitted = top.len(),
            matched = report.matched,
            positional = report.positional,
            risk = %analysis.fraud_risk,
            originality = analysis.originality_score,
            "similarity scored"
        );
        Ok(Scored {
            analysis,
            candidates: top,
        })
    }

    /// `score`, with every failure except a refusal or a rate limit replaced
    /// by the policy analysis. Candidates then come back unscored.
    pub async fn score_or_fallback(
        &self,
        description: &str,
        candidates: &[CandidateProject],
        policy: &FallbackPolicy,
    ) -> Result<Scored> {
        ensure_metrics_described();
        match self.score(description, candidates).await {
            Ok(s) => Ok(s),
            Err(e @ ScoutError::ModelRefusal(_)) => Err(e),
            Err(e @ ScoutError::Llm(LlmError::RateLimited(_))) => {
                tracing::warn!(error = %e, "similarity scoring rate limited");
                Err(e)
            }
            Err(e) => {
                metrics::counter!("similarity_fallback_total").increment(1);
                tracing::warn!(error = %e, kind = e.kind().code(), "similarity scoring failed, using fallback");
                Ok(Scored {
                    analysis: SimilarityAnalysis::from_policy(policy),
                    candidates: self.prepare(candidates),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{Platform, RawResult, SearchRun};

    pub(crate) fn candidates(n: usize) -> Vec<CandidateProject> {
        let mut run = SearchRun::new(None);
        (0..n)
            .filter_map(|i| {
                let raw = RawResult {
                    name: format!("P{i}"),
                    description: format!("project number {i} does things"),
                    url: format!("https://devpost.com/software/p{i}"),
                    metrics: CatalogMetrics::Listing {
                        likes: i as u64,
                        comments: 0,
                        is_winner: i == 0,
                        submission_date: None,
                    },
                };
                run.admit(Platform::Devpost, raw, "q", 300).1
            })
            .collect()
    }

    fn score(id: Option<&str>, sim: u8) -> ProjectScore {
        ProjectScore {
            id: id.map(str::to_string),
            similarity: sim,
            reasoning: format!("r{sim}"),
            ..Default::default()
        }
    }

    #[test]
    fn merge_by_id_ignores_order() {
        let mut c = candidates(3);
        let ids: Vec<String> = c.iter().map(|c| c.id().to_string()).collect();
        let scores = vec![score(Some(&ids[2]), 30), score(Some(&ids[0]), 90)];
        let r = merge_scores(&mut c, &scores);
        assert_eq!(r, MergeReport { matched: 2, unmatched: 1, positional: false });
        assert_eq!(c[0].ai_similarity, Some(90));
        assert_eq!(c[1].ai_similarity, Some(0));
        assert_eq!(c[1].ai_reasoning.as_deref(), Some(NOT_ANALYZED));
        assert_eq!(c[2].ai_similarity, Some(30));
    }

    #[test]
    fn positional_only_when_lengths_match() {
        let mut c = candidates(2);
        let r = merge_scores(&mut c, &[score(None, 10), score(None, 20)]);
        assert!(r.positional);
        assert_eq!(c[1].ai_similarity, Some(20));

        let mut c = candidates(3);
        let r = merge_scores(&mut c, &[score(None, 10), score(None, 20)]);
        assert_eq!(r.matched, 0);
        assert!(c.iter().all(|c| c.ai_similarity == Some(0)));
    }

    #[test]
    fn analysis_parsing_is_lenient() {
        let a: SimilarityAnalysis = serde_json::from_str(
            r#"{"fraud_risk": "medium", "originality_score": 72.6,
                "project_scores": [{"name": "x", "similarity": 140}]}"#,
        )
        .unwrap();
        assert_eq!(a.fraud_risk, FraudRisk::Medium);
        assert_eq!(a.originality_score, 73);
        assert_eq!(a.project_scores[0].similarity, 100);
        assert_eq!(serde_json::to_value(FraudRisk::Unknown).unwrap(), "UNKNOWN");
    }

    #[test]
    fn prompt_lists_ids_and_metrics() {
        let c = candidates(2);
        let p = scoring_prompt("my project", &c);
        assert!(p.contains(&format!("[id: {}] [Devpost] P0", c[0].id())));
        assert!(p.contains("Likes: 0, Winner: true"));
        assert!(p.contains("\"project_scores\""));
    }

    #[tokio::test]
    async fn rate_limit_skips_fallback() {
        use crate::error::ErrorKind;
        use crate::llm::ScriptedModel;
        use std::sync::Arc;

        let model = Arc::new(ScriptedModel::new([Err(LlmError::RateLimited("quota".into()))]));
        let scorer = Scorer::new(model, ScoringConfig::default());
        let err = scorer
            .score_or_fallback("my project", &candidates(2), &FallbackPolicy::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);

        let model = Arc::new(ScriptedModel::new([Err(LlmError::Upstream("500".into()))]));
        let scorer = Scorer::new(model, ScoringConfig::default());
        let out = scorer
            .score_or_fallback("my project", &candidates(2), &FallbackPolicy::default())
            .await
            .unwrap();
        assert_eq!(out.analysis.fraud_risk, FraudRisk::Unknown);
    }
}
