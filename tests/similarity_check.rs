// tests/similarity_check.rs
//
// End-to-end similarity runs over fixture pages and a scripted model.
//
// Covered:
// - validation gate before any search or model call
// - reachable page without usable content is InvalidContent
// - rate limits surface instead of degrading to fallbacks
// - refusal from the strategy model surfaces as ModelRefusal
// - submitted URL exclusion, content dedup and cross-query URL dedup
// - zero candidates: LOW / 95 without a scorer call
// - id-based score merge and the configured fallback

use std::sync::Arc;

use hackathon_blueprint::config::ScoutConfig;
use hackathon_blueprint::error::ErrorKind;
use hackathon_blueprint::fetch::FixtureTransport;
use hackathon_blueprint::llm::{LlmError, ScriptedModel};
use hackathon_blueprint::pipeline::Blueprint;
use hackathon_blueprint::progress::{ProgressEvent, ProgressSink};
use hackathon_blueprint::search::Platform;
use hackathon_blueprint::similarity::{FraudRisk, NOT_ANALYZED};
use hackathon_blueprint::text::content_hash;

const TARGET: &str = "https://devpost.com/software/target-app";
const LISTING_FACT: &str = "https://devpost.com/software/search?page=1&query=fact+check";
const LISTING_MISINFO: &str = "https://devpost.com/software/search?page=1&query=misinformation";
const CODE_FACT: &str =
    "https://api.github.com/search/repositories?q=fact+check&sort=stars&order=desc&per_page=3";

const STRATEGIES: &str = r#"{
  "goal_impact": [{"query": "fact check", "reason": "core problem"}],
  "category": [{"query": "misinformation", "reason": "domain"}],
  "technology": []
}"#;

fn target_page(description: &str) -> String {
    format!(
        r#"<html><head><title>Target App | Devpost</title></head><body>
          <h1 id="app-title">Target App</h1>
          <div id="app-details-left"><p>{description}</p></div>
          <time class="timeago" datetime="2024-06-22T10:00:00Z">June</time>
          <footer>Devpost helps developers and teams share what they build at hackathons around the world.</footer>
        </body></html>"#
    )
}

const GOOD_DESCRIPTION: &str = "A browser extension that checks claims in news articles \
    against primary sources and highlights the ones that do not hold up.";

fn card(href: &str, name: &str, tagline: &str) -> String {
    format!(
        r#"<a class="block-wrapper-link" href="{href}"><div class="software-entry">
             <h5>{name}</h5><p class="tagline">{tagline}</p>
             <span class="like-count">4</span><span class="comment-count">1</span>
           </div></a>"#
    )
}

fn listing(cards: &[String]) -> String {
    format!("<html><body>{}</body></html>", cards.join("\n"))
}

fn config(tmp: &tempfile::TempDir) -> ScoutConfig {
    let mut cfg = ScoutConfig::default().without_delays();
    cfg.storage.data_dir = tmp.path().join("data");
    cfg
}

fn drain(mut rx: tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

/// Listing and code-search fixtures shared by the search tests.
fn catalog_fixtures(t: FixtureTransport) -> FixtureTransport {
    t.page(
        LISTING_FACT,
        listing(&[
            card("/software/target-app/", "Target App", "The submitted project itself"),
            card("/software/alpha", "Alpha", "Checks claims in articles"),
        ]),
    )
    .page(
        LISTING_MISINFO,
        listing(&[
            card("/software/alpha", "Alpha", "Checks claims in articles"),
            card("/software/alpha/", "Alpha mirror", "A second listing of the same page"),
            card("/software/beta", "Beta", "Debunks viral posts"),
        ]),
    )
    .page(
        CODE_FACT,
        r#"{"items": [{"name": "gamma", "full_name": "o/gamma", "description": "Fact checking bot",
             "html_url": "https://github.com/o/gamma", "stargazers_count": 42, "language": "Python",
             "created_at": "2023-01-01T00:00:00Z", "updated_at": "2024-01-01T00:00:00Z"}]}"#,
    )
}

#[tokio::test]
async fn unreachable_target_stops_before_model() {
    let tmp = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::repeating(STRATEGIES));
    let bp = Blueprint::new(config(&tmp), model.clone(), Arc::new(FixtureTransport::new()));

    let err = bp
        .similarity_check(TARGET, &ProgressSink::discard())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unreachable);
    assert!(err.to_string().starts_with("Invalid link."));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn short_description_is_insufficient_input() {
    let tmp = tempfile::tempdir().unwrap();
    let t = FixtureTransport::new().page(TARGET, target_page("Too short to judge."));
    let model = Arc::new(ScriptedModel::repeating(STRATEGIES));
    let bp = Blueprint::new(config(&tmp), model.clone(), Arc::new(t));

    let err = bp
        .similarity_check(TARGET, &ProgressSink::discard())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientInput);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn shell_page_is_invalid_content() {
    let tmp = tempfile::tempdir().unwrap();
    let t = FixtureTransport::new().page(
        TARGET,
        "<html><head><title>Target App</title></head><body><div id=\"root\"></div></body></html>",
    );
    let model = Arc::new(ScriptedModel::repeating(STRATEGIES));
    let bp = Blueprint::new(config(&tmp), model.clone(), Arc::new(t));

    let err = bp
        .similarity_check(TARGET, &ProgressSink::discard())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidContent);
    assert_eq!(err.kind().code(), "invalid_content");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn strategy_refusal_is_model_refusal_and_skips_search() {
    let tmp = tempfile::tempdir().unwrap();
    let t = Arc::new(FixtureTransport::new().page(TARGET, target_page(GOOD_DESCRIPTION)));
    let model = Arc::new(ScriptedModel::replies([
        "I cannot analyze this project because the description appears to be missing.",
    ]));
    let bp = Blueprint::new(config(&tmp), model.clone(), t.clone());

    let err = bp
        .similarity_check(TARGET, &ProgressSink::discard())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelRefusal);
    assert_eq!(err.kind().code(), "model_refusal");
    assert_eq!(t.requests(), vec![TARGET.to_string()]);
}

#[tokio::test]
async fn zero_candidates_is_low_risk_without_scorer_call() {
    let tmp = tempfile::tempdir().unwrap();
    // Every catalog URL answers 404.
    let t = FixtureTransport::new().page(TARGET, target_page(GOOD_DESCRIPTION));
    let model = Arc::new(ScriptedModel::replies([STRATEGIES]));
    let bp = Blueprint::new(config(&tmp), model.clone(), Arc::new(t));

    let (sink, rx) = ProgressSink::channel();
    let out = bp.similarity_check(&format!("{TARGET}/?ref=share"), &sink).await.unwrap();
    drop(sink);

    assert_eq!(out.result.fraud_risk, FraudRisk::Low);
    assert_eq!(out.result.originality_score, 95);
    assert_eq!(out.result.total_projects, 0);
    assert_eq!(out.result.project_name, "Target App");
    assert_eq!(out.result.submission_date.as_deref(), Some("Jun 22, 2024"));
    assert_eq!(model.calls(), 1, "only the strategy prompt reaches the model");

    let events = drain(rx);
    match events.last() {
        Some(ProgressEvent::Complete { status, result }) => {
            assert_eq!(status, "Complete");
            assert_eq!(result["fraud_risk"], "LOW");
            assert_eq!(result["originality_score"], 95);
        }
        other => panic!("expected final result, got {other:?}"),
    }
}

#[tokio::test]
async fn search_excludes_target_dedups_and_merges_scores_by_id() {
    let tmp = tempfile::tempdir().unwrap();
    let t = catalog_fixtures(FixtureTransport::new().page(TARGET, target_page(GOOD_DESCRIPTION)));

    let alpha_id = &content_hash("Checks claims in articles")[..12];
    let gamma_id = &content_hash("Fact checking bot")[..12];
    let analysis = format!(
        r#"Here is the analysis:
```json
        {{"project_scores": [
            {{"id": "{gamma_id}", "name": "gamma", "similarity": 81, "reasoning": "same approach"}},
            {{"id": "{alpha_id}", "name": "Alpha", "similarity": 64, "reasoning": "same problem"}}
          ],
          "fraud_risk": "medium",
          "red_flags": ["Near-identical pitch"],
          "originality_score": 40,
          "summary": "Two close matches",
          "recommendation": "Ask the team"}}
```"#
    );
    let model = Arc::new(ScriptedModel::replies([STRATEGIES.to_string(), analysis]));
    let bp = Blueprint::new(config(&tmp), model.clone(), Arc::new(t));

    let (sink, rx) = ProgressSink::channel();
    let out = bp.similarity_check(TARGET, &sink).await.unwrap();
    drop(sink);

    let names: Vec<_> = out.candidates.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "gamma"]);
    assert!(out.candidates.iter().all(|c| !c.url.contains("target-app")));
    assert_eq!(out.candidates[2].platform, Platform::GitHub);

    assert_eq!(out.result.fraud_risk, FraudRisk::Medium);
    assert_eq!(out.result.originality_score, 40);
    assert_eq!(out.result.total_projects, 3);

    assert_eq!(out.candidates[0].ai_similarity, Some(64));
    assert_eq!(out.candidates[1].ai_similarity, Some(0));
    assert_eq!(out.candidates[1].ai_reasoning.as_deref(), Some(NOT_ANALYZED));
    assert_eq!(out.candidates[2].ai_similarity, Some(81));

    let events = drain(rx);
    let progress: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::Project { source_progress, .. } => Some(source_progress.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec!["Devpost: 1", "Devpost: 2", "GitHub: 1"]);

    let updates = events
        .iter()
        .filter(|e| matches!(e, ProgressEvent::ProjectUpdate { .. }))
        .count();
    assert_eq!(updates, 3);
}

#[tokio::test]
async fn scorer_failure_uses_fallback_policy() {
    let tmp = tempfile::tempdir().unwrap();
    let t = catalog_fixtures(FixtureTransport::new().page(TARGET, target_page(GOOD_DESCRIPTION)));
    let model = Arc::new(ScriptedModel::new([
        Ok(STRATEGIES.to_string()),
        Err(LlmError::Upstream("status 500: overloaded".into())),
    ]));
    let mut cfg = config(&tmp);
    cfg.storage.save_reports = true;
    let bp = Blueprint::new(cfg, model.clone(), Arc::new(t));

    let out = bp
        .similarity_check(TARGET, &ProgressSink::discard())
        .await
        .unwrap();
    assert_eq!(out.result.fraud_risk, FraudRisk::Unknown);
    assert_eq!(out.result.originality_score, 50);
    assert_eq!(out.analysis.recommendation, "Manual review required");
    assert!(out.candidates.iter().all(|c| c.ai_similarity.is_none()));

    let report = std::fs::read_to_string(out.report_path.expect("report saved")).unwrap();
    assert!(report.contains("HACKATHON FRAUD DETECTION REPORT"));
    assert!(report.contains("Fraud Risk: UNKNOWN"));
    assert!(report.contains("Name: gamma"));
}

#[tokio::test]
async fn rate_limits_are_reported_not_degraded() {
    // Scorer rate limited after a normal search.
    let tmp = tempfile::tempdir().unwrap();
    let t = catalog_fixtures(FixtureTransport::new().page(TARGET, target_page(GOOD_DESCRIPTION)));
    let model = Arc::new(ScriptedModel::new([
        Ok(STRATEGIES.to_string()),
        Err(LlmError::RateLimited("quota exceeded".into())),
    ]));
    let bp = Blueprint::new(config(&tmp), model.clone(), Arc::new(t));

    let (sink, rx) = ProgressSink::channel();
    let err = bp.similarity_check(TARGET, &sink).await.unwrap_err();
    drop(sink);
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(err.kind().code(), "rate_limited");
    assert_eq!(model.calls(), 2);
    assert!(!drain(rx).iter().any(|e| matches!(e, ProgressEvent::Complete { .. })));

    // Strategy generation rate limited: no catalog is queried.
    let tmp = tempfile::tempdir().unwrap();
    let t = Arc::new(catalog_fixtures(FixtureTransport::new().page(TARGET, target_page(GOOD_DESCRIPTION))));
    let model = Arc::new(ScriptedModel::new([Err(LlmError::RateLimited("quota exceeded".into()))]));
    let bp = Blueprint::new(config(&tmp), model, t.clone());

    let err = bp
        .similarity_check(TARGET, &ProgressSink::discard())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(t.requests(), vec![TARGET.to_string()]);
}
