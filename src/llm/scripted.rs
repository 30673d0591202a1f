// src/llm/scripted.rs
//! Offline models: a scripted queue for tests and a prompt-aware mock for
//! `AI_TEST_MODE=mock` local runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{LanguageModel, LlmError};

/// Replays queued replies in order and records every prompt it receives.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    repeat: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, LlmError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            repeat: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replies<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Ok(t.into())))
    }

    /// Answers every prompt with the same text.
    pub fn repeating(text: impl Into<String>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            repeat: Some(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(prompt.to_string());
        let next = self
            .replies
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front();
        match (next, &self.repeat) {
            (Some(reply), _) => reply,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(LlmError::Upstream("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Deterministic stand-in that recognizes which prompt it was given.
pub struct MockModel;

const MOCK_STRATEGIES: &str = r#"{
  "goal_impact": [{"query": "fact check", "reason": "core problem"}],
  "category": [{"query": "browser extension", "reason": "project type"}],
  "technology": [{"query": "AI detector", "reason": "general tech"}]
}"#;

const MOCK_ANALYSIS: &str = r#"{
  "project_scores": [],
  "fraud_risk": "LOW",
  "red_flags": [],
  "originality_score": 88,
  "summary": "Mock analysis: no close matches.",
  "recommendation": "No action needed (mock)."
}"#;

const MOCK_IDEAS: &str = "### Idea 1: Mock Idea\n\
**Problem Statement**: Placeholder problem used by the mock model.\n\
**Solution Overview**: Placeholder solution.\n\
**Key Technologies**:\n- Rust\n- Axum\n\
**Why It Wins**: It is deterministic.\n\
**Inspired By**: Mock Project\n\
**Implementation Roadmap**:\n1. Build it\n2. Demo it\n";

const MOCK_BREAKDOWN: &str = "## Implementation Guide (mock)\n\n\
1. Set up the repository and a minimal web server.\n\
2. Implement the core feature end to end with stubbed data.\n\
3. Polish the demo path and prepare the pitch.\n";

#[async_trait]
impl LanguageModel for MockModel {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        let lower = prompt.to_lowercase();
        let reply = if prompt.contains("\"project_scores\"") {
            MOCK_ANALYSIS
        } else if prompt.contains("\"goal_impact\"") {
            MOCK_STRATEGIES
        } else if lower.contains("implementation guide") {
            MOCK_BREAKDOWN
        } else {
            MOCK_IDEAS
        };
        Ok(reply.to_string())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
