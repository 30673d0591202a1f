// src/strategy.rs
//! Search-strategy generation: one model call turns a project description
//! into short, broad catalog queries.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScoutError};
use crate::llm::decode::{decode_as, DecodeError};
use crate::llm::{LanguageModel, LlmError};
use crate::text::{anon_id, truncate_chars, truncate_words, WORD_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyCategory {
    GoalImpact,
    Category,
    Technology,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStrategy {
    pub query: String,
    pub reason: String,
    pub category: StrategyCategory,
}

impl SearchStrategy {
    pub fn new(query: impl Into<String>, reason: impl Into<String>, category: StrategyCategory) -> Self {
        Self {
            query: query.into(),
            reason: reason.into(),
            category,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawStrategy {
    query: String,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Deserialize)]
struct StrategyResponse {
    #[serde(default)]
    goal_impact: Vec<RawStrategy>,
    #[serde(default)]
    category: Vec<RawStrategy>,
    #[serde(default)]
    technology: Vec<RawStrategy>,
}

impl StrategyResponse {
    /// Categories flattened in fixed order; blank queries dropped.
    fn flatten(self) -> Vec<SearchStrategy> {
        [
            (StrategyCategory::GoalImpact, self.goal_impact),
            (StrategyCategory::Category, self.category),
            (StrategyCategory::Technology, self.technology),
        ]
        .into_iter()
        .flat_map(|(cat, items)| {
            items.into_iter().filter_map(move |r| {
                let q = r.query.trim();
                (!q.is_empty()).then(|| SearchStrategy::new(q, r.reason, cat))
            })
        })
        .collect()
    }
}

pub fn strategy_prompt(description: &str) -> String {
    format!(
        r#"You generate SIMPLE search queries for finding projects similar to the one below on Devpost and GitHub.

TARGET PROJECT DESCRIPTION:
{description}

Produce 8-10 short, broad queries that will match MANY existing projects.

Rules:
1. Every query is 1-3 common words.
2. Prefer broad phrasing over specific phrasing.
3. No framework names or technical jargon.
4. Describe the problem or goal, not the implementation.

Categories:
- goal_impact (3 queries): the core problem or benefit, e.g. "fact check", "mental health", "track emotions"
- category (3 queries): the kind of project or domain, e.g. "mood app", "misinformation", "conservation"
- technology (2-3 queries): only very general technology, e.g. "browser extension", "mobile app", "AI detector"

Respond with JSON only, in exactly this shape:
{{
  "goal_impact": [{{"query": "1-3 words", "reason": "simple goal"}}],
  "category": [{{"query": "1-3 words", "reason": "broad category"}}],
  "technology": [{{"query": "1-3 words", "reason": "general tech"}}]
}}"#
    )
}

/// Up to two phrases lifted from the description itself.
pub fn fallback_strategies(description: &str) -> Vec<SearchStrategy> {
    let words: Vec<&str> = description.split_whitespace().collect();
    let mut out = Vec::new();
    if words.len() >= 5 {
        out.push(SearchStrategy::new(
            words[..5].join(" "),
            "First key phrase from description",
            StrategyCategory::GoalImpact,
        ));
    }
    if words.len() >= 10 {
        out.push(SearchStrategy::new(
            words[5..10].join(" "),
            "Second key phrase from description",
            StrategyCategory::GoalImpact,
        ));
    }
    if out.is_empty() {
        out.push(SearchStrategy::new(
            truncate_chars(description.trim(), 50),
            "Fallback - first 50 chars",
            StrategyCategory::GoalImpact,
        ));
    }
    out
}

/// Ordered strategies for `description`. A model refusal or a rate limit is
/// an error; every other failure degrades to `fallback_strategies`.
pub async fn generate_strategies(
    model: &dyn LanguageModel,
    description: &str,
    max_tokens: u32,
) -> Result<Vec<SearchStrategy>> {
    let description = truncate_words(description, WORD_LIMIT);
    let prompt = strategy_prompt(&description);

    let outcome = match model.complete(&prompt, max_tokens).await {
        Ok(raw) => decode_as::<StrategyResponse>(&raw).map(StrategyResponse::flatten),
        Err(e @ LlmError::RateLimited(_)) => {
            tracing::warn!(error = %e, "strategy model call rate limited");
            return Err(e.into());
        }
        Err(e) => {
            tracing::warn!(error = %e, "strategy model call failed, using description phrases");
            return Ok(fallback_strategies(&description));
        }
    };

    match outcome {
        Ok(strategies) if !strategies.is_empty() => {
            tracing::info!(
                count = strategies.len(),
                desc_id = %anon_id(&description),
                first = ?strategies.iter().take(5).map(|s| s.query.as_str()).collect::<Vec<_>>(),
                "search strategies generated"
            );
            Ok(strategies)
        }
        Ok(_) => {
            tracing::warn!("model produced no strategies, using description phrases");
            Ok(fallback_strategies(&description))
        }
        Err(DecodeError::Refusal(s)) => {
            tracing::warn!(snippet = %s, "model refused to generate strategies");
            Err(ScoutError::ModelRefusal(format!(
                "Invalid project description - the model could not process it ({s})"
            )))
        }
        Err(DecodeError::Unparsable(s)) => {
            tracing::warn!(snippet = %s, "strategy output unparsable, using description phrases");
            Ok(fallback_strategies(&description))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::llm::ScriptedModel;

    const DESC: &str = "A browser extension that checks claims in news articles against primary sources";

    #[tokio::test]
    async fn categories_flatten_in_fixed_order() {
        let model = ScriptedModel::replies([r#"```json
        {"technology": [{"query": "browser extension", "reason": "t"}],
         "goal_impact": [{"query": "fact check", "reason": "g"}, {"query": "  ", "reason": "blank"}],
         "category": [{"query": "misinformation", "reason": "c"}]}
        ```"#]);
        let s = generate_strategies(&model, DESC, 2000).await.unwrap();
        let queries: Vec<_> = s.iter().map(|s| s.query.as_str()).collect();
        assert_eq!(queries, vec!["fact check", "misinformation", "browser extension"]);
        assert_eq!(s[2].category, StrategyCategory::Technology);
        assert!(model.prompts()[0].contains("\"goal_impact\""));
    }

    #[tokio::test]
    async fn refusal_is_an_error() {
        let model = ScriptedModel::replies(["I cannot analyze this, the description is missing."]);
        let err = generate_strategies(&model, DESC, 2000).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelRefusal);
    }

    #[tokio::test]
    async fn other_failures_fall_back_to_phrases() {
        let model = ScriptedModel::new([Err(LlmError::Timeout)]);
        let s = generate_strategies(&model, DESC, 2000).await.unwrap();
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].query, "A browser extension that checks");
        assert_eq!(s[1].query, "claims in news articles against");

        let model = ScriptedModel::replies(["Sure, here are some ideas"]);
        let s = generate_strategies(&model, DESC, 2000).await.unwrap();
        assert_eq!(s.len(), 2);
    }

    #[tokio::test]
    async fn rate_limit_is_surfaced() {
        let model = ScriptedModel::new([Err(LlmError::RateLimited("quota".into()))]);
        let err = generate_strategies(&model, DESC, 2000).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.kind().code(), "rate_limited");
    }

    #[test]
    fn short_description_uses_first_chars() {
        let s = fallback_strategies("tiny app");
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].query, "tiny app");
        assert_eq!(fallback_strategies("one two three four five six").len(), 1);
    }
}
