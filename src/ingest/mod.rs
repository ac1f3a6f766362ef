// src/ingest/mod.rs
pub mod config;
pub mod normalize;
pub mod providers;
pub mod types;

pub use normalize::normalize_text;

use crate::ingest::types::{Candidate, SourceProvider};
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Total items parsed from providers.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when ingest last ran."
        );
    });
}

/// Outcome of one merge across all providers.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub candidates: Vec<Candidate>,
    /// (provider name, item count) in merge order.
    pub per_provider: Vec<(String, usize)>,
    pub provider_errors: usize,
}

/// Fetch every provider, normalize, and concatenate in provider order.
///
/// Providers run concurrently, but results are merged in the slice order so that the
/// downstream first-seen-wins dedup is reproducible. A failing provider is logged and
/// contributes zero candidates.
pub async fn run_once(providers: &[Box<dyn SourceProvider>]) -> IngestReport {
    ensure_metrics_described();

    let pending: Vec<_> = providers.iter().map(|p| p.fetch_latest()).collect();
    let results = join_all(pending).await;

    let mut report = IngestReport::default();
    for (p, res) in providers.iter().zip(results) {
        match res {
            Ok(items) => {
                report.per_provider.push((p.name().to_string(), items.len()));
                report
                    .candidates
                    .extend(items.into_iter().map(normalize::normalize_candidate));
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
                report.per_provider.push((p.name().to_string(), 0));
                report.provider_errors += 1;
            }
        }
    }

    let now = chrono::Utc::now().timestamp().max(0);
    gauge!("ingest_pipeline_last_run_ts").set(now as f64);
    tracing::info!(
        target: "ingest",
        merged = report.candidates.len(),
        errors = report.provider_errors,
        "ingest merged"
    );
    report
}
