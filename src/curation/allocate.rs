// src/curation/allocate.rs
//! Regional quota fill.
//!
//! Overseas: strong-allow tier, then semi-allow, then anything not denied, each tier
//! walked in score order and only after the previous tier is exhausted.
//! Domestic: the domestic partition in score order, then a backfill from the whole
//! scored pool using the suffix classification alone.

use serde::Serialize;
use std::collections::HashSet;

use crate::curation::domains::DomainList;
use crate::curation::region::RegionClassifier;
use crate::curation::scoring::ScoredCandidate;
use crate::ingest::types::Region;

/// How an item got into its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FillTier {
    StrongAllow,
    SemiAllow,
    General,
    Partition,
    Backfill,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Allocated {
    #[serde(flatten)]
    pub item: ScoredCandidate,
    pub tier: FillTier,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegionBucket {
    pub region: Region,
    pub target: usize,
    pub items: Vec<Allocated>,
}

impl RegionBucket {
    fn new(region: Region, target: usize) -> Self {
        Self {
            region,
            target,
            items: Vec::with_capacity(target),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.target
    }

    pub fn links(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|a| a.item.candidate.link.as_str())
    }

    /// Walk `pool` in order and take items passing `eligible` until the target is met.
    fn fill<'p, I, F>(&mut self, pool: I, tier: FillTier, used: &mut HashSet<String>, eligible: F)
    where
        I: IntoIterator<Item = &'p ScoredCandidate>,
        F: Fn(&ScoredCandidate) -> bool,
    {
        for sc in pool {
            if self.is_full() {
                break;
            }
            if used.contains(&sc.candidate.link) || !eligible(sc) {
                continue;
            }
            used.insert(sc.candidate.link.clone());
            self.items.push(Allocated {
                item: sc.clone(),
                tier,
            });
        }
    }
}

pub struct Allocator<'a> {
    pub strong_allow: &'a DomainList,
    pub semi_allow: &'a DomainList,
    pub deny: &'a DomainList,
    pub region: &'a RegionClassifier,
}

impl<'a> Allocator<'a> {
    /// `scored` must already be sorted by descending score.
    /// Returns `(domestic, overseas)`; no link lands in both.
    pub fn allocate(
        &self,
        scored: &[ScoredCandidate],
        domestic_target: usize,
        overseas_target: usize,
    ) -> (RegionBucket, RegionBucket) {
        let (domestic_pool, overseas_pool): (Vec<&ScoredCandidate>, Vec<&ScoredCandidate>) = scored
            .iter()
            .partition(|sc| self.region.classify(&sc.candidate) == Region::Domestic);

        let mut used: HashSet<String> = HashSet::new();

        let mut overseas = RegionBucket::new(Region::Overseas, overseas_target);
        overseas.fill(overseas_pool.iter().copied(), FillTier::StrongAllow, &mut used, |sc| {
            self.strong_allow.matches(&sc.candidate.link)
        });
        overseas.fill(overseas_pool.iter().copied(), FillTier::SemiAllow, &mut used, |sc| {
            self.semi_allow.matches(&sc.candidate.link)
        });
        overseas.fill(overseas_pool.iter().copied(), FillTier::General, &mut used, |sc| {
            !self.deny.matches(&sc.candidate.link)
        });

        let mut domestic = RegionBucket::new(Region::Domestic, domestic_target);
        domestic.fill(domestic_pool.iter().copied(), FillTier::Partition, &mut used, |_| true);
        domestic.fill(scored.iter(), FillTier::Backfill, &mut used, |sc| {
            self.region.is_domestic_link(&sc.candidate.link) && !self.deny.matches(&sc.candidate.link)
        });

        (domestic, overseas)
    }
}
