// src/curation/relevance.rs
//! Keyword relevance: case-insensitive substring hits against the topic and
//! technology sets, AND first with an OR fallback.

use serde::Serialize;

use crate::curation::config::KeywordSets;
use crate::ingest::types::Candidate;

/// Which filter produced the relevant pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelevanceMode {
    /// Both sets matched.
    And,
    /// Nothing matched both sets; either set was enough.
    Or,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeywordHits {
    pub topic: usize,
    pub technology: usize,
}

impl KeywordHits {
    pub fn total(&self) -> usize {
        self.topic + self.technology
    }
    pub fn both(&self) -> bool {
        self.topic > 0 && self.technology > 0
    }
    pub fn either(&self) -> bool {
        self.topic > 0 || self.technology > 0
    }
}

#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    topic: Vec<String>,
    technology: Vec<String>,
}

impl KeywordMatcher {
    pub fn new(sets: &KeywordSets) -> Self {
        let lower = |v: &[String]| -> Vec<String> {
            v.iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect()
        };
        Self {
            topic: lower(&sets.topic),
            technology: lower(&sets.technology),
        }
    }

    /// Number of keywords from each set found in `text`. Each keyword counts once.
    pub fn hits(&self, text: &str) -> KeywordHits {
        let t = text.to_lowercase();
        KeywordHits {
            topic: self.topic.iter().filter(|k| t.contains(k.as_str())).count(),
            technology: self
                .technology
                .iter()
                .filter(|k| t.contains(k.as_str()))
                .count(),
        }
    }

    pub fn candidate_hits(&self, c: &Candidate) -> KeywordHits {
        self.hits(&c.text())
    }

    /// Keep items matching both sets; if none do, keep items matching either.
    /// Input order is preserved.
    pub fn filter(&self, pool: Vec<Candidate>) -> (Vec<Candidate>, RelevanceMode) {
        let hits: Vec<KeywordHits> = pool.iter().map(|c| self.candidate_hits(c)).collect();
        let mode = if hits.iter().any(KeywordHits::both) {
            RelevanceMode::And
        } else {
            RelevanceMode::Or
        };
        let kept = pool
            .into_iter()
            .zip(hits)
            .filter(|(_, h)| match mode {
                RelevanceMode::And => h.both(),
                RelevanceMode::Or => h.either(),
            })
            .map(|(c, _)| c)
            .collect();
        (kept, mode)
    }
}
