//! # Digest Engine
//! One bounded run: ingest every source, curate, summarize each selected item,
//! assemble the LINE messages. Delivery is left to the caller.
//!
//! Nothing in a run is fatal; source, extraction and generation failures are
//! absorbed where they happen and an empty digest is a valid result.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::curation::{CurationOutcome, Curator, RegionBucket};
use crate::digest::{build_messages, Message};
use crate::ingest::types::{Region, SourceProvider};
use crate::ingest::{run_once, IngestReport};
use crate::summarize::{SummarizedItem, SummaryGenerator};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_runs_total", "Digest runs assembled.");
    });
}

/// Ingest + curation result.
#[derive(Debug, Clone)]
pub struct Collected {
    pub ingest: IngestReport,
    pub outcome: CurationOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestRun {
    pub domestic: Vec<SummarizedItem>,
    pub overseas: Vec<SummarizedItem>,
    pub messages: Vec<Message>,
}

pub struct DigestEngine {
    providers: Vec<Box<dyn SourceProvider>>,
    curator: Curator,
    generator: SummaryGenerator,
    topic: String,
}

impl DigestEngine {
    pub fn new(
        providers: Vec<Box<dyn SourceProvider>>,
        curator: Curator,
        generator: SummaryGenerator,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            providers,
            curator,
            generator,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn curator(&self) -> &Curator {
        &self.curator
    }

    pub async fn collect(&self) -> Collected {
        self.collect_at(Utc::now()).await
    }

    /// Window is measured from `now`.
    pub async fn collect_at(&self, now: DateTime<Utc>) -> Collected {
        let ingest = run_once(&self.providers).await;
        let outcome = self.curator.curate(ingest.candidates.clone(), now);
        Collected { ingest, outcome }
    }

    /// Summaries for both buckets, domestic first; bucket order is kept.
    pub async fn summarize(&self, outcome: &CurationOutcome) -> (Vec<SummarizedItem>, Vec<SummarizedItem>) {
        let tagged = |bucket: &RegionBucket, region: Region| {
            bucket
                .items
                .iter()
                .map(move |a| (a.item.candidate.clone(), region))
                .collect::<Vec<_>>()
        };
        let mut items = tagged(&outcome.domestic, Region::Domestic);
        items.extend(tagged(&outcome.overseas, Region::Overseas));
        let mut all = self.generator.summarize_all(&items).await;
        let overseas = all.split_off(outcome.domestic.items.len());
        (all, overseas)
    }

    pub async fn build_digest(&self) -> DigestRun {
        self.build_digest_at(Utc::now()).await
    }

    pub async fn build_digest_at(&self, now: DateTime<Utc>) -> DigestRun {
        ensure_metrics_described();
        let collected = self.collect_at(now).await;
        let (domestic, overseas) = self.summarize(&collected.outcome).await;

        let dom: Vec<_> = domestic.iter().map(|s| s.record.clone()).collect();
        let ovr: Vec<_> = overseas.iter().map(|s| s.record.clone()).collect();
        let messages = build_messages(&self.topic, &dom, &ovr);

        counter!("digest_runs_total").increment(1);
        tracing::info!(
            target: "digest",
            domestic = domestic.len(),
            overseas = overseas.len(),
            messages = messages.len(),
            "digest assembled"
        );
        DigestRun {
            domestic,
            overseas,
            messages,
        }
    }
}
