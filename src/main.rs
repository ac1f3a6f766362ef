//! Weekly digest service: binary entrypoint.
//! Loads configuration, wires sources, curation, summarization and LINE delivery into
//! the axum router, and hands it to the Shuttle runtime.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eldercare_digest::api::{self, AppState};
use eldercare_digest::config::{AiConfig, AppConfig};
use eldercare_digest::curation::{CurationConfig, Curator};
use eldercare_digest::engine::DigestEngine;
use eldercare_digest::ingest::config::SourcesConfig;
use eldercare_digest::metrics::Metrics;
use eldercare_digest::notify::LineTransport;
use eldercare_digest::registry::JsonFileRegistry;
use eldercare_digest::summarize::{build_backend, HttpExtractor, SummaryGenerator};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("eldercare_digest=info,warn"));

    // The Shuttle runtime may already have installed a subscriber.
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

    let app = AppConfig::from_env()?;

    let curation = CurationConfig::load_default()?;
    let sources = SourcesConfig::load_default()?;
    let ai = AiConfig::load_default().unwrap_or_else(|e| {
        tracing::warn!(error = ?e, "AI config unusable; summaries will use the fallback");
        AiConfig::default()
    });

    let providers = sources.build_providers(
        app.newsapi_key.clone(),
        curation.window_days,
        &curation.domains.strong_allow,
    );
    let generator = SummaryGenerator::new(build_backend(&ai), Arc::new(HttpExtractor::default()))
        .with_concurrency(ai.concurrency);

    let metrics = Metrics::init(
        curation.window_days,
        curation.quotas.domestic,
        curation.quotas.overseas,
    )?;

    tracing::info!(
        providers = providers.len(),
        ai_enabled = ai.enabled,
        registry = %app.registry_path.display(),
        "digest service starting"
    );

    let engine = DigestEngine::new(providers, Curator::new(curation), generator, app.topic.clone());
    let state = AppState::new(
        Arc::new(engine),
        Arc::new(LineTransport::new(app.line_channel_access_token.clone())),
        Arc::new(JsonFileRegistry::new(app.registry_path.clone())),
        app.default_to.clone(),
    );

    let router = api::router(state).merge(metrics.router());
    Ok(router.into())
}
