// src/lib.rs
// Public library surface for the API binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod text;

// Page acquisition and structure
pub mod chain;
pub mod classify;
pub mod extract;
pub mod fetch;
pub mod resolve;

// Event scraping, ideas and persistence
pub mod event;
pub mod ideas;
pub mod store;

// Similarity check
pub mod report;
pub mod search;
pub mod similarity;
pub mod strategy;

// Model seam and run orchestration
pub mod llm;
pub mod pipeline;
pub mod progress;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, router, AppState};
pub use crate::error::{ErrorKind, Result, ScoutError};
pub use crate::pipeline::Blueprint;
pub use crate::progress::{ProgressEvent, ProgressSink};

use tracing::info;

use crate::llm::LanguageModel as _;

/// One-off check that the configured model answers. Never fails the caller;
/// the outcome is only logged.
///
/// ```ignore
/// hackathon_blueprint::run_model_probe().await;
/// ```
pub async fn run_model_probe() {
    let ai = config::AiConfig::load_default();
    if !ai.enabled {
        tracing::warn!("model probe skipped: AI is disabled in config");
        return;
    }
    let model = llm::build_model(&ai);
    match model.complete("Reply with the single word: ok", 16).await {
        Ok(reply) => info!(provider = model.name(), reply = %text::truncate_chars(&reply, 40), "model probe finished"),
        Err(e) => tracing::warn!(provider = model.name(), error = %e, "model probe failed"),
    }
}
