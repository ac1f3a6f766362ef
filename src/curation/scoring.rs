// src/curation/scoring.rs
//! Weighted-sum scoring: relevance primary, trust secondary, freshness currently
//! weighted at zero but still computed and reported.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::curation::config::ScoringWeights;
use crate::curation::relevance::KeywordMatcher;
use crate::curation::trust::DomainTrust;
use crate::ingest::types::Candidate;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    /// Keyword hits across both sets.
    pub relevance: usize,
    /// Linear decay over the horizon, `[0, 1]`.
    pub freshness: f64,
    /// Normalized domain trust, `[0, 1]`.
    pub trust: f64,
    pub score: f64,
}

/// `max(0, horizon - age_hours) / horizon`, clamped. Missing timestamps score zero.
pub fn freshness(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>, horizon_hours: f64) -> f64 {
    let Some(ts) = published_at else {
        return 0.0;
    };
    if horizon_hours <= 0.0 {
        return 0.0;
    }
    let age_h = (now - ts).num_seconds() as f64 / 3600.0;
    ((horizon_hours - age_h).max(0.0) / horizon_hours).clamp(0.0, 1.0)
}

pub struct Scorer<'a> {
    pub weights: ScoringWeights,
    pub keywords: &'a KeywordMatcher,
    pub trust: &'a DomainTrust,
}

impl<'a> Scorer<'a> {
    pub fn score(&self, c: Candidate, now: DateTime<Utc>) -> ScoredCandidate {
        let relevance = self.keywords.candidate_hits(&c).total();
        let fresh = freshness(c.published_at, now, self.weights.freshness_horizon_hours);
        let trust = self.trust.normalized(&c.link);
        let score = relevance as f64 * self.weights.relevance
            + fresh * self.weights.freshness
            + trust * self.weights.trust;
        ScoredCandidate {
            candidate: c,
            relevance,
            freshness: fresh,
            trust,
            score,
        }
    }

    /// Score everything and sort by score, descending. The sort is stable, so ties keep
    /// their input order.
    pub fn rank(&self, items: Vec<Candidate>, now: DateTime<Utc>) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = items.into_iter().map(|c| self.score(c, now)).collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::config::CurationConfig;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 8, 0, 0, 0).unwrap()
    }

    #[test]
    fn freshness_decays_linearly() {
        let n = now();
        assert_eq!(freshness(Some(n), n, 168.0), 1.0);
        assert!((freshness(Some(n - Duration::hours(84)), n, 168.0) - 0.5).abs() < 1e-9);
        assert_eq!(freshness(Some(n - Duration::hours(200)), n, 168.0), 0.0);
        assert_eq!(freshness(None, n, 168.0), 0.0);
        // future items cap at 1
        assert_eq!(freshness(Some(n + Duration::hours(5)), n, 168.0), 1.0);
    }

    #[test]
    fn relevance_outranks_trust() {
        let cfg = CurationConfig::default_seed();
        let km = KeywordMatcher::new(&cfg.keywords);
        let dt = DomainTrust::new(&cfg.trust);
        let s = Scorer {
            weights: cfg.scoring,
            keywords: &km,
            trust: &dt,
        };
        let trusted = Candidate::new("Elderly AI", "https://www.nature.com/a").published(now());
        let relevant = Candidate::new(
            "Elderly dementia care uses AI and telemedicine",
            "https://blog.example.org/b",
        )
        .published(now());
        let ranked = s.rank(vec![trusted, relevant], now());
        assert_eq!(ranked[0].candidate.link, "https://blog.example.org/b");
        assert!((ranked[1].trust - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_input_order() {
        let cfg = CurationConfig::default_seed();
        let km = KeywordMatcher::new(&cfg.keywords);
        let dt = DomainTrust::new(&cfg.trust);
        let s = Scorer {
            weights: cfg.scoring,
            keywords: &km,
            trust: &dt,
        };
        let a = Candidate::new("介護 AI", "https://a.jp/1");
        let b = Candidate::new("介護 AI", "https://b.jp/2");
        let ranked = s.rank(vec![a, b], now());
        assert_eq!(ranked[0].candidate.link, "https://a.jp/1");
    }
}
