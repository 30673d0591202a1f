// src/llm/mod.rs
//! Language-model seam: provider abstraction, daily call budget and the
//! defensive decoder for model output.
//!
//! Every caller goes through `LanguageModel::complete`; concrete providers are
//! chosen once at startup by `build_model`.

pub mod decode;
pub mod providers;
pub mod scripted;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AiConfig;
use crate::error::ErrorKind;

pub use decode::{decode_json, DecodeError, Decoded};
pub use providers::{ClaudeProvider, OpenAiProvider};
pub use scripted::{MockModel, ScriptedModel};

#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("model calls are disabled")]
    Disabled,
    #[error("rate limit or quota exceeded: {0}")]
    RateLimited(String),
    #[error("model call timed out")]
    Timeout,
    #[error("provider rejected the request: {0}")]
    InvalidRequest(String),
    #[error("provider error: {0}")]
    Upstream(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::RateLimited(_) => ErrorKind::RateLimited,
            LlmError::Timeout => ErrorKind::Timeout,
            LlmError::InvalidRequest(_) => ErrorKind::InsufficientInput,
            LlmError::EmptyResponse => ErrorKind::MalformedModelOutput,
            LlmError::Disabled | LlmError::Upstream(_) | LlmError::Transport(_) => {
                ErrorKind::Upstream
            }
        }
    }

    /// Classify a provider failure from its HTTP status and body text.
    pub fn from_status(status: u16, body: &str) -> Self {
        let lower = body.to_lowercase();
        if status == 429 || lower.contains("quota") || lower.contains("rate limit") {
            return LlmError::RateLimited(crate::text::truncate_chars(body, 200));
        }
        match status {
            408 | 504 => LlmError::Timeout,
            400 | 422 => LlmError::InvalidRequest(crate::text::truncate_chars(body, 200)),
            _ => LlmError::Upstream(format!(
                "status {status}: {}",
                crate::text::truncate_chars(body, 200)
            )),
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Transport(e.to_string())
        }
    }
}

/// Prompt in, text out. Implementations must be cheap to share behind `Arc`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
    /// Provider name for diagnostics.
    fn name(&self) -> &'static str;
}

pub type DynModel = Arc<dyn LanguageModel>;

/// Factory: build a model according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns the deterministic mock model.
/// * Else if `config.enabled == false`, returns a disabled model.
/// * Else builds the real provider wrapped with the daily budget.
pub fn build_model(config: &AiConfig) -> DynModel {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Arc::new(MockModel);
    }

    if !config.enabled {
        return Arc::new(DisabledModel);
    }

    let model = config.model.as_deref();
    match config.provider.as_str() {
        "claude" => Arc::new(BudgetedModel::new(
            ClaudeProvider::new(&config.api_key, model, config.timeout_secs),
            default_budget_dir(),
            config.daily_limit,
        )),
        "openai" => Arc::new(BudgetedModel::new(
            OpenAiProvider::new(&config.api_key, model, config.timeout_secs),
            default_budget_dir(),
            config.daily_limit,
        )),
        other => {
            tracing::warn!(provider = other, "unknown model provider, model calls disabled");
            Arc::new(DisabledModel)
        }
    }
}

/// Always fails with `LlmError::Disabled`; used when AI is switched off.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

// ------------------------------------------------------------
// Daily budget wrapper
// ------------------------------------------------------------

fn default_budget_dir() -> PathBuf {
    PathBuf::from("cache/ai")
}

/// Caps real provider calls per calendar day. The counter is persisted so a
/// restart does not reset the budget.
pub struct BudgetedModel<M: LanguageModel> {
    inner: M,
    dir: PathBuf,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
}

impl<M: LanguageModel> BudgetedModel<M> {
    pub fn new(inner: M, dir: PathBuf, daily_limit: u32) -> Self {
        let _ = fs::create_dir_all(&dir);
        let counter = Mutex::new(load_daily_counter(&dir).unwrap_or_default());
        Self {
            inner,
            dir,
            daily_limit,
            counter,
        }
    }

    fn reserve(&self) -> Result<(), LlmError> {
        let mut g = self.counter.lock().unwrap_or_else(|p| p.into_inner());
        if g.is_expired() {
            g.reset_to_today();
            let _ = save_daily_counter(&self.dir, &g);
        }
        if g.count >= self.daily_limit {
            return Err(LlmError::RateLimited(format!(
                "daily model budget of {} calls exhausted",
                self.daily_limit
            )));
        }
        Ok(())
    }

    fn record_call(&self) {
        let mut g = self.counter.lock().unwrap_or_else(|p| p.into_inner());
        g.count = g.count.saturating_add(1);
        if let Err(e) = save_daily_counter(&self.dir, &g) {
            tracing::warn!(error = %e, "failed to persist daily model counter");
        }
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for BudgetedModel<M> {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        ensure_metrics_described();
        if let Err(e) = self.reserve() {
            metrics::counter!("llm_calls_total", "outcome" => "budget_exhausted").increment(1);
            return Err(e);
        }

        let started = std::time::Instant::now();
        let out = self.inner.complete(prompt, max_tokens).await;
        // A failed call still reached the provider and counts against the budget.
        self.record_call();

        let outcome = match &out {
            Ok(_) => "ok",
            Err(LlmError::RateLimited(_)) => "rate_limited",
            Err(LlmError::Timeout) => "timeout",
            Err(_) => "error",
        };
        metrics::counter!("llm_calls_total", "outcome" => outcome).increment(1);
        tracing::info!(
            provider = self.inner.name(),
            outcome,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "model call finished"
        );
        out
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let p = counter_path(dir);
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(dc).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(&tmp, s)?;
    fs::rename(tmp, p)
}

// ------------------------------------------------------------
// Metrics
// ------------------------------------------------------------

static METRICS_DESCRIBED: once_cell::sync::OnceCell<()> = once_cell::sync::OnceCell::new();

fn ensure_metrics_described() {
    METRICS_DESCRIBED.get_or_init(|| {
        metrics::describe_counter!(
            "llm_calls_total",
            "Model calls by outcome (ok, error, timeout, rate_limited, budget_exhausted)."
        );
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn budget_blocks_after_limit() {
        let dir = tempfile::tempdir().unwrap();
        let inner = ScriptedModel::repeating("ok");
        let model = BudgetedModel::new(inner, dir.path().to_path_buf(), 2);

        assert!(model.complete("a", 10).await.is_ok());
        assert!(model.complete("b", 10).await.is_ok());
        let err = model.complete("c", 10).await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(_)));
        assert_eq!(err.kind(), ErrorKind::RateLimited);

        // Persisted: a fresh wrapper over the same dir is still exhausted.
        let again = BudgetedModel::new(ScriptedModel::repeating("ok"), dir.path().to_path_buf(), 2);
        assert!(again.complete("d", 10).await.is_err());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            LlmError::from_status(429, "slow down"),
            LlmError::RateLimited(_)
        ));
        assert!(matches!(
            LlmError::from_status(403, "Your quota has been exceeded"),
            LlmError::RateLimited(_)
        ));
        assert!(matches!(
            LlmError::from_status(400, "bad prompt"),
            LlmError::InvalidRequest(_)
        ));
        assert_eq!(LlmError::from_status(504, "").kind(), ErrorKind::Timeout);
        assert_eq!(LlmError::from_status(500, "boom").kind(), ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn disabled_model_always_fails() {
        let err = DisabledModel.complete("x", 1).await.unwrap_err();
        assert!(matches!(err, LlmError::Disabled));
    }
}
