// src/curation/mod.rs
//! Curation pipeline: window → canonical links → required fields → deny list →
//! relevance (AND, else OR) → greedy dedup → scoring → regional quota fill.
//!
//! Total by construction: every stage degrades to "whatever qualifies", including
//! nothing, and empty buckets are a normal outcome.

pub mod allocate;
pub mod config;
pub mod dedup;
pub mod domains;
pub mod region;
pub mod relevance;
pub mod scoring;
pub mod trust;

pub use allocate::{Allocated, FillTier, RegionBucket};
pub use config::CurationConfig;
pub use relevance::RelevanceMode;
pub use scoring::ScoredCandidate;

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::curation::allocate::Allocator;
use crate::curation::domains::DomainList;
use crate::curation::region::RegionClassifier;
use crate::curation::relevance::KeywordMatcher;
use crate::curation::scoring::Scorer;
use crate::curation::trust::DomainTrust;
use crate::ingest::normalize::canonicalize_link;
use crate::ingest::types::Candidate;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "curation_kept_total",
            "Candidates surviving each curation stage."
        );
        describe_gauge!("curation_bucket_size", "Items allocated per region bucket.");
    });
}

/// Per-stage survivor counts for one run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CurationStats {
    pub merged: usize,
    pub in_window: usize,
    pub with_required_fields: usize,
    pub after_deny: usize,
    pub relevant: usize,
    pub relevance_mode: Option<RelevanceMode>,
    pub after_dedup: usize,
    pub domestic_selected: usize,
    pub overseas_selected: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CurationOutcome {
    pub domestic: RegionBucket,
    pub overseas: RegionBucket,
    /// Full scored pool, descending. Kept for diagnostics.
    #[serde(skip)]
    pub ranked: Vec<ScoredCandidate>,
    pub stats: CurationStats,
}

impl CurationOutcome {
    pub fn is_empty(&self) -> bool {
        self.domestic.is_empty() && self.overseas.is_empty()
    }
}

/// Compiled view of a [`CurationConfig`]; build once, run many times.
pub struct Curator {
    cfg: CurationConfig,
    deny: DomainList,
    strong_allow: DomainList,
    semi_allow: DomainList,
    keywords: KeywordMatcher,
    trust: DomainTrust,
    region: RegionClassifier,
}

impl Curator {
    pub fn new(cfg: CurationConfig) -> Self {
        Self {
            deny: DomainList::new(&cfg.domains.deny),
            strong_allow: DomainList::new(&cfg.domains.strong_allow),
            semi_allow: DomainList::new(&cfg.domains.semi_allow),
            keywords: KeywordMatcher::new(&cfg.keywords),
            trust: DomainTrust::new(&cfg.trust),
            region: RegionClassifier::new(&cfg.region),
            cfg,
        }
    }

    pub fn config(&self) -> &CurationConfig {
        &self.cfg
    }

    pub fn region_classifier(&self) -> &RegionClassifier {
        &self.region
    }

    pub fn curate(&self, candidates: Vec<Candidate>, now: DateTime<Utc>) -> CurationOutcome {
        ensure_metrics_described();
        let mut stats = CurationStats {
            merged: candidates.len(),
            ..Default::default()
        };

        // 1) window: inclusive lower bound, missing timestamps dropped
        let cutoff = now - Duration::days(self.cfg.window_days);
        let pool: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.published_at.is_some_and(|ts| ts >= cutoff))
            .collect();
        stats.in_window = pool.len();

        // 2) canonical links, 3) required fields
        let pool: Vec<Candidate> = pool
            .into_iter()
            .map(|mut c| {
                c.link = canonicalize_link(&c.link);
                c.title = c.title.trim().to_string();
                c
            })
            .filter(|c| !c.title.is_empty() && !c.link.is_empty())
            .collect();
        stats.with_required_fields = pool.len();

        // 4) deny list
        let pool: Vec<Candidate> = pool
            .into_iter()
            .filter(|c| !self.deny.matches(&c.link))
            .collect();
        stats.after_deny = pool.len();

        // 5) relevance
        let (pool, mode) = self.keywords.filter(pool);
        stats.relevant = pool.len();
        stats.relevance_mode = Some(mode);
        if mode == RelevanceMode::Or {
            tracing::info!(target: "curation", kept = pool.len(), "no item matched both keyword sets; using OR fallback");
        }

        // 6) dedup
        let (pool, dropped) =
            dedup::dedup_greedy(pool, self.cfg.dedup.title_similarity_threshold);
        stats.after_dedup = pool.len();

        // 7) score + sort
        let scorer = Scorer {
            weights: self.cfg.scoring,
            keywords: &self.keywords,
            trust: &self.trust,
        };
        let ranked = scorer.rank(pool, now);

        // 8–10) partition + quota fill
        let allocator = Allocator {
            strong_allow: &self.strong_allow,
            semi_allow: &self.semi_allow,
            deny: &self.deny,
            region: &self.region,
        };
        let (domestic, overseas) =
            allocator.allocate(&ranked, self.cfg.quotas.domestic, self.cfg.quotas.overseas);
        stats.domestic_selected = domestic.len();
        stats.overseas_selected = overseas.len();

        for (stage, n) in [
            ("window", stats.in_window),
            ("required", stats.with_required_fields),
            ("deny", stats.after_deny),
            ("relevance", stats.relevant),
            ("dedup", stats.after_dedup),
        ] {
            counter!("curation_kept_total", "stage" => stage).increment(n as u64);
        }
        gauge!("curation_bucket_size", "region" => "domestic").set(domestic.len() as f64);
        gauge!("curation_bucket_size", "region" => "overseas").set(overseas.len() as f64);

        tracing::info!(
            target: "curation",
            merged = stats.merged,
            in_window = stats.in_window,
            relevant = stats.relevant,
            dedup_dropped = dropped,
            domestic = domestic.len(),
            overseas = overseas.len(),
            "curation done"
        );

        CurationOutcome {
            domestic,
            overseas,
            ranked,
            stats,
        }
    }
}

/// One-shot convenience over [`Curator`].
pub fn curate(candidates: Vec<Candidate>, cfg: &CurationConfig, now: DateTime<Utc>) -> CurationOutcome {
    Curator::new(cfg.clone()).curate(candidates, now)
}
