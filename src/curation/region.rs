// src/curation/region.rs
//! Domestic/overseas classification.
//!
//! An explicit region tag on the candidate wins. Otherwise the link host decides:
//! exception hosts and hosts under a domestic suffix are domestic, everything else
//! (including unparseable links) is overseas.

use crate::curation::config::RegionRules;
use crate::curation::domains::host_matches;
use crate::ingest::normalize::host_of;
use crate::ingest::types::{Candidate, Region};

#[derive(Debug, Clone)]
pub struct RegionClassifier {
    suffixes: Vec<String>,
    exceptions: Vec<String>,
}

impl RegionClassifier {
    pub fn new(rules: &RegionRules) -> Self {
        Self {
            suffixes: rules
                .domestic_suffixes
                .iter()
                .map(|s| s.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            exceptions: rules
                .domestic_exceptions
                .iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_domestic_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }
        self.exceptions.iter().any(|d| host_matches(&host, d))
            || self.suffixes.iter().any(|s| host_matches(&host, s))
    }

    pub fn is_domestic_link(&self, link: &str) -> bool {
        self.is_domestic_host(&host_of(link))
    }

    /// Link-only classification, ignoring any tag.
    pub fn classify_link(&self, link: &str) -> Region {
        if self.is_domestic_link(link) {
            Region::Domestic
        } else {
            Region::Overseas
        }
    }

    pub fn classify(&self, c: &Candidate) -> Region {
        c.region.unwrap_or_else(|| self.classify_link(&c.link))
    }
}
