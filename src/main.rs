//! Blueprint API binary entrypoint.
//! Boots the Axum HTTP server: idea generation, breakdowns and similarity
//! checks, plus Prometheus metrics.

use hackathon_blueprint::{
    api::{create_router, AppState},
    config::{AiConfig, ScoutConfig},
    metrics::Metrics,
};
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact tracing logs; `RUST_LOG` overrides the default filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("hackathon_blueprint=info,warn"));

    // A second init (e.g. the runtime already installed one) is not an error.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = ScoutConfig::load_default().map_err(shuttle_runtime::Error::Custom)?;
    let ai = AiConfig::load_default();
    if std::env::var("BLUEPRINT_MODEL_PROBE").is_ok_and(|v| v == "1") {
        hackathon_blueprint::run_model_probe().await;
    }

    let metrics = Metrics::init().map_err(shuttle_runtime::Error::Custom)?;
    let state = AppState::from_config(cfg, &ai);
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
