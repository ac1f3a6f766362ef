//! Run one curation pass (optionally with summaries and the message payload) and print
//! the result as JSON. Nothing is sent.

use std::sync::Arc;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eldercare_digest::config::AiConfig;
use eldercare_digest::curation::{CurationConfig, Curator};
use eldercare_digest::engine::DigestEngine;
use eldercare_digest::ingest::config::SourcesConfig;
use eldercare_digest::summarize::{build_backend, HttpExtractor, SummaryGenerator};

#[derive(Parser, Debug)]
#[command(name = "collect-once", about = "Collect and curate the weekly digest once")]
struct Args {
    /// Also summarize the selected items and assemble the messages.
    #[arg(long)]
    summarize: bool,

    /// Preamble topic.
    #[arg(long, env = "TOPIC", default_value = eldercare_digest::config::app::DEFAULT_TOPIC)]
    topic: String,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("eldercare_digest=info,warn"));
    // logs go to stderr so stdout stays valid JSON
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();

    let args = Args::parse();

    let curation = CurationConfig::load_default()?;
    let sources = SourcesConfig::load_default()?;
    let ai = AiConfig::load_default().unwrap_or_else(|e| {
        tracing::warn!(error = ?e, "AI config unusable; summaries will use the fallback");
        AiConfig::default()
    });
    let newsapi_key = std::env::var("NEWSAPI_KEY").ok().filter(|k| !k.trim().is_empty());

    let providers =
        sources.build_providers(newsapi_key, curation.window_days, &curation.domains.strong_allow);
    let generator = SummaryGenerator::new(build_backend(&ai), Arc::new(HttpExtractor::default()))
        .with_concurrency(ai.concurrency);
    let engine = DigestEngine::new(providers, Curator::new(curation), generator, args.topic);

    let out = if args.summarize {
        serde_json::to_value(engine.build_digest().await)?
    } else {
        let collected = engine.collect().await;
        json!({
            "per_provider": collected.ingest.per_provider,
            "provider_errors": collected.ingest.provider_errors,
            "curation": collected.outcome,
        })
    };

    let text = if args.pretty {
        serde_json::to_string_pretty(&out)?
    } else {
        serde_json::to_string(&out)?
    };
    println!("{text}");
    Ok(())
}
