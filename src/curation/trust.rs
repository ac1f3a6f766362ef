//! # Domain Trust
//!
//! Maps a link's host to a trust weight on the configured `0..=max_weight` scale.
//!
//! - Lookup is by host suffix: `www.nature.com` and `news.nature.com` both hit `nature.com`.
//! - When several table entries match, the longest (most specific) one wins.
//! - Unknown hosts weigh zero.

use std::collections::HashMap;

use crate::curation::config::TrustTable;
use crate::curation::domains::host_matches;
use crate::ingest::normalize::host_of;

#[derive(Debug, Clone)]
pub struct DomainTrust {
    max_weight: f32,
    weights: HashMap<String, f32>,
}

impl DomainTrust {
    pub fn new(table: &TrustTable) -> Self {
        Self {
            max_weight: table.max_weight,
            weights: table
                .weights
                .iter()
                .map(|(k, &v)| (k.to_ascii_lowercase(), v.clamp(0.0, table.max_weight)))
                .collect(),
        }
    }

    /// Raw weight for a host (`0..=max_weight`).
    pub fn weight_for_host(&self, host: &str) -> f32 {
        let host = host.trim().trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return 0.0;
        }
        // Exact hit first, then the most specific suffix.
        if let Some(&w) = self.weights.get(&host) {
            return w;
        }
        self.weights
            .iter()
            .filter(|(d, _)| host_matches(&host, d))
            .max_by_key(|(d, _)| d.len())
            .map(|(_, &w)| w)
            .unwrap_or(0.0)
    }

    pub fn weight_for_link(&self, link: &str) -> f32 {
        self.weight_for_host(&host_of(link))
    }

    /// Weight divided by the scale maximum, in `[0.0, 1.0]`.
    pub fn normalized(&self, link: &str) -> f64 {
        if self.max_weight <= 0.0 {
            return 0.0;
        }
        f64::from(self.weight_for_link(link) / self.max_weight).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::config::CurationConfig;

    fn seed() -> DomainTrust {
        DomainTrust::new(&CurationConfig::default_seed().trust)
    }

    #[test]
    fn suffix_lookup() {
        let t = seed();
        assert_eq!(t.weight_for_link("https://www.nature.com/articles/x"), 5.0);
        assert_eq!(t.weight_for_link("https://ninds.nih.gov/news"), 4.0);
        assert_eq!(t.weight_for_link("https://blogs.nvidia.com/p"), 2.0);
    }

    #[test]
    fn lookalike_hosts_do_not_match() {
        let t = seed();
        assert_eq!(t.weight_for_link("https://notnature.com/a"), 0.0);
        assert_eq!(t.weight_for_link("https://nature.com.evil.io/a"), 0.0);
    }

    #[test]
    fn unknown_and_garbage_weigh_zero() {
        let t = seed();
        assert_eq!(t.weight_for_link("https://example.org/a"), 0.0);
        assert_eq!(t.weight_for_link("not a url"), 0.0);
        assert_eq!(t.normalized("not a url"), 0.0);
    }

    #[test]
    fn normalized_is_on_unit_scale() {
        let t = seed();
        assert!((t.normalized("https://www.bmj.com/x") - 1.0).abs() < 1e-9);
        assert!((t.normalized("https://arxiv.org/abs/1") - 0.6).abs() < 1e-6);
    }
}
