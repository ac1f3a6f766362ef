// src/curation/dedup.rs
//! Greedy, first-seen-wins duplicate removal.
//!
//! Each item is checked against the set accepted so far (not the whole pool): same
//! canonical link, or a title strictly more similar than the threshold. The outcome
//! therefore depends on input order; callers pin merge order to keep it reproducible.

use std::collections::HashSet;

use crate::ingest::types::Candidate;

/// Sørensen–Dice over character bigrams, whitespace ignored. Symmetric, in `[0, 1]`.
///
/// `strsim` counts shared bigrams per char but divides by byte length, which shrinks
/// the score of multi-byte (Japanese) titles. The result is rescaled to char length.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a: String = a.chars().filter(|c| !c.is_whitespace()).collect();
    let b: String = b.chars().filter(|c| !c.is_whitespace()).collect();
    if a == b {
        return 1.0;
    }
    let chars = a.chars().count() + b.chars().count();
    if a.chars().count() < 2 || b.chars().count() < 2 {
        return 0.0;
    }
    let bytes = a.len() + b.len();
    let raw = strsim::sorensen_dice(&a, &b);
    (raw * (bytes - 2) as f64 / (chars - 2) as f64).min(1.0)
}

/// Returns `(kept, dropped_count)`.
pub fn dedup_greedy(items: Vec<Candidate>, threshold: f64) -> (Vec<Candidate>, usize) {
    let mut seen_links: HashSet<String> = HashSet::new();
    let mut kept: Vec<Candidate> = Vec::with_capacity(items.len());
    let mut dropped = 0usize;

    for c in items {
        if seen_links.contains(&c.link) {
            dropped += 1;
            continue;
        }
        if kept
            .iter()
            .any(|k| title_similarity(&k.title, &c.title) > threshold)
        {
            tracing::debug!(target: "curation", title = %c.title, "near-duplicate title dropped");
            dropped += 1;
            continue;
        }
        seen_links.insert(c.link.clone());
        kept.push(c);
    }
    (kept, dropped)
}
