// src/api.rs
//! HTTP surface: health, idea generation and similarity checks streamed as
//! server-sent events, stored ideas and breakdowns.

use std::convert::Infallible;
use std::sync::Arc;

use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::json;
use shuttle_axum::axum::{
    extract::{Path, State},
    http::{header::HeaderName, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tower_http::cors::CorsLayer;

use crate::config::{AiConfig, ScoutConfig};
use crate::error::ScoutError;
use crate::fetch::ReqwestTransport;
use crate::ideas::Idea;
use crate::llm::{build_model, LanguageModel as _};
use crate::pipeline::Blueprint;
use crate::progress::{ProgressEvent, ProgressSink};

#[derive(Clone)]
pub struct AppState {
    blueprint: Blueprint,
}

impl AppState {
    pub fn new(blueprint: Blueprint) -> Self {
        Self { blueprint }
    }

    /// Live wiring: real HTTP transport and the configured model provider.
    pub fn from_config(cfg: ScoutConfig, ai: &AiConfig) -> Self {
        let model = build_model(ai);
        tracing::info!(provider = model.name(), "model ready");
        Self::new(Blueprint::new(cfg, model, Arc::new(ReqwestTransport::new())))
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.blueprint
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/ideas/{*path}", get(ideas))
        .route("/breakdown", post(breakdown))
        .route("/similarity-check", post(similarity_check))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Router wired from `config/scout.toml` and `config/ai.json`.
pub fn router() -> Router {
    let cfg = ScoutConfig::load_default().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "scout config unavailable, using defaults");
        ScoutConfig::default()
    });
    create_router(AppState::from_config(cfg, &AiConfig::load_default()))
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

/// JSON error body `{"error": code, "detail": message}` with the status of
/// the error kind.
pub struct ApiError(ScoutError);

impl From<ScoutError> for ApiError {
    fn from(e: ScoutError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        if kind.status().is_server_error() {
            tracing::warn!(error = %self.0, code = kind.code(), "request failed");
        }
        (
            kind.status(),
            Json(json!({"error": kind.code(), "detail": self.0.to_string()})),
        )
            .into_response()
    }
}

fn not_found(detail: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "not_found", "detail": detail})),
    )
        .into_response()
}

// ------------------------------------------------------------
// Streaming
// ------------------------------------------------------------

/// Frames until the first terminal event, or until every sender is gone.
fn event_stream(rx: UnboundedReceiver<ProgressEvent>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(rx), |state| async move {
        let mut rx = state?;
        let ev = rx.recv().await?;
        let data = serde_json::to_string(&ev).unwrap_or_else(|_| r#"{"error":"unserializable event"}"#.to_string());
        let next = (!ev.is_terminal()).then_some(rx);
        Some((Ok(Event::default().data(data)), next))
    })
}

/// SSE response fed by a spawned run. The stream closes after the final
/// result or error event.
fn sse_response(rx: UnboundedReceiver<ProgressEvent>) -> impl IntoResponse {
    (
        [(HeaderName::from_static("x-accel-buffering"), "no")],
        Sse::new(event_stream(rx)),
    )
}

// ------------------------------------------------------------
// Handlers
// ------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "message": "Blueprint API is running"}))
}

#[derive(Debug, Deserialize)]
struct GenerateReq {
    hackathon_url: String,
    #[serde(default)]
    past_hackathons: Option<Vec<String>>,
}

async fn generate(State(state): State<AppState>, Json(body): Json<GenerateReq>) -> impl IntoResponse {
    let (sink, rx) = ProgressSink::channel();
    let bp = state.blueprint.clone();
    tokio::spawn(async move {
        sink.status("Initializing...", "Setting up generator");
        if body.hackathon_url.trim().is_empty() {
            sink.emit(ProgressEvent::error(&ScoutError::InsufficientInput(
                "hackathon_url is required".to_string(),
            )));
            return;
        }
        let past = body.past_hackathons.unwrap_or_default();
        if let Err(e) = bp.generate(&body.hackathon_url, &past, &sink).await {
            tracing::warn!(error = %e, url = %body.hackathon_url, "idea generation failed");
            sink.emit(ProgressEvent::error(&e));
        }
    });
    sse_response(rx)
}

async fn ideas(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match state.blueprint.load_ideas(&path) {
        Some(ideas) => Json(json!({ "ideas": ideas })).into_response(),
        None => not_found("Ideas file not found"),
    }
}

#[derive(Debug, Deserialize)]
struct BreakdownReq {
    #[serde(default)]
    idea: Option<Idea>,
    #[serde(default)]
    hackathon_folder: Option<String>,
}

async fn breakdown(State(state): State<AppState>, Json(body): Json<BreakdownReq>) -> Result<Response, ApiError> {
    let Some(idea) = body.idea else {
        return Err(ScoutError::InsufficientInput("Idea is required".to_string()).into());
    };
    let out = state
        .blueprint
        .breakdown(&idea, body.hackathon_folder.as_deref())
        .await?;
    Ok(Json(out).into_response())
}

#[derive(Debug, Deserialize)]
struct SimilarityReq {
    devpost_url: String,
}

async fn similarity_check(State(state): State<AppState>, Json(body): Json<SimilarityReq>) -> impl IntoResponse {
    let (sink, rx) = ProgressSink::channel();
    let bp = state.blueprint.clone();
    tokio::spawn(async move {
        if let Err(e) = bp.similarity_check(&body.devpost_url, &sink).await {
            tracing::info!(error = %e, code = e.kind().code(), url = %body.devpost_url, "similarity check ended with error");
            sink.emit(ProgressEvent::error(&e));
        }
    });
    sse_response(rx)
}
