// src/curation/config.rs
//! Curation tables and knobs: domain lists, trust weights, keyword sets, regional
//! suffixes, quotas, window and scoring weights.
//!
//! Loaded once at startup and handed to [`crate::curation::Curator`]; nothing here is
//! global, so tests build their own.
//!
//! Lookup order for [`CurationConfig::load_default`]:
//! 1) `$CURATION_CONFIG_PATH` (must exist)
//! 2) `config/curation.toml`
//! 3) built-in [`CurationConfig::default_seed`]

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CURATION_CONFIG_PATH: &str = "CURATION_CONFIG_PATH";
pub const DEFAULT_CURATION_CONFIG_PATH: &str = "config/curation.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CurationConfig {
    /// Look-back window in days, measured from pipeline invocation.
    pub window_days: i64,
    pub quotas: Quotas,
    pub keywords: KeywordSets,
    pub domains: DomainLists,
    pub trust: TrustTable,
    pub region: RegionRules,
    pub scoring: ScoringWeights,
    pub dedup: DedupParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Quotas {
    pub domestic: usize,
    pub overseas: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct KeywordSets {
    /// Domain-topic set (eldercare vocabulary).
    pub topic: Vec<String>,
    /// Technology set (AI / digital health vocabulary).
    pub technology: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DomainLists {
    /// Primary / peer-reviewed / major-institution domains (overseas tier A).
    pub strong_allow: Vec<String>,
    /// Reputable secondary sources (overseas tier B).
    pub semi_allow: Vec<String>,
    /// Excluded outright. Entries may carry a path prefix: `apnews.com/press-release`.
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustTable {
    /// Top of the weight scale; weights are divided by this when scoring.
    pub max_weight: f32,
    /// Domain (suffix-matched) → weight in `0..=max_weight`.
    pub weights: BTreeMap<String, f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RegionRules {
    /// Host suffixes that mark a link as domestic, e.g. ".jp".
    pub domestic_suffixes: Vec<String>,
    /// Hosts always treated as domestic regardless of suffix.
    pub domestic_exceptions: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoringWeights {
    pub relevance: f64,
    pub freshness: f64,
    pub trust: f64,
    /// Freshness decays linearly to zero over this many hours.
    pub freshness_horizon_hours: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DedupParams {
    /// Titles strictly above this similarity are duplicates.
    pub title_similarity_threshold: f64,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self::default_seed()
    }
}

impl CurationConfig {
    /// Built-in reference tables.
    pub fn default_seed() -> Self {
        let strong_allow = strings(&[
            "who.int",
            "oecd.org",
            "nih.gov",
            "ninds.nih.gov",
            "nlm.nih.gov",
            "hhs.gov",
            "cdc.gov",
            "ema.europa.eu",
            "nhs.uk",
            "nature.com",
            "thelancet.com",
            "nejm.org",
            "bmj.com",
            "jamanetwork.com",
            "medrxiv.org",
            "arxiv.org",
            "stanford.edu",
            "harvard.edu",
            "ox.ac.uk",
            "cam.ac.uk",
            "imperial.ac.uk",
            "ucl.ac.uk",
            "mit.edu",
            "mayoclinic.org",
            "clevelandclinic.org",
            "massgeneral.org",
            "kuh.ac.kr",
            "singhealth.com.sg",
        ]);
        let semi_allow = strings(&[
            "healthit.gov",
            "whoop.com",
            "philips.com",
            "gehealthcare.com",
            "siemens-healthineers.com",
            "nvidia.com",
            "microsoft.com",
            "googleblog.com",
            "openai.com",
        ]);
        let deny = strings(&[
            "medium.com",
            "pinterest.com",
            "linkedin.com",
            "facebook.com",
            "x.com",
            "twitter.com",
            "businesswire.com",
            "prnewswire.com",
            "globenewswire.com",
            "newswire.com",
            "einnews.com",
            "apnews.com/press-release",
            "marketwatch.com/press-release",
            "benzinga.com/pressreleases",
        ]);

        let mut weights = BTreeMap::new();
        for (k, v) in [
            ("who.int", 4.0),
            ("oecd.org", 3.0),
            ("nih.gov", 4.0),
            ("hhs.gov", 3.0),
            ("cdc.gov", 4.0),
            ("ema.europa.eu", 4.0),
            ("nhs.uk", 4.0),
            ("nature.com", 5.0),
            ("thelancet.com", 5.0),
            ("nejm.org", 5.0),
            ("bmj.com", 5.0),
            ("jamanetwork.com", 5.0),
            ("medrxiv.org", 3.0),
            ("arxiv.org", 3.0),
            ("stanford.edu", 4.0),
            ("harvard.edu", 4.0),
            ("ox.ac.uk", 4.0),
            ("cam.ac.uk", 4.0),
            ("imperial.ac.uk", 4.0),
            ("ucl.ac.uk", 4.0),
            ("mit.edu", 4.0),
            ("mayoclinic.org", 4.0),
            ("clevelandclinic.org", 4.0),
            ("massgeneral.org", 4.0),
            ("healthit.gov", 3.0),
            ("nvidia.com", 2.0),
            ("microsoft.com", 2.0),
            ("googleblog.com", 2.0),
            ("openai.com", 2.0),
        ] {
            weights.insert(k.to_string(), v);
        }

        Self {
            window_days: 7,
            quotas: Quotas {
                domestic: 5,
                overseas: 3,
            },
            keywords: KeywordSets {
                topic: strings(&[
                    "高齢者",
                    "介護",
                    "老人",
                    "在宅医療",
                    "地域包括",
                    "見守り",
                    "転倒",
                    "認知症",
                    "介護保険",
                    "介護DX",
                    "シルバー",
                    "geriatric",
                    "elderly",
                    "seniors",
                    "older adults",
                    "nursing home",
                    "care home",
                    "long-term care",
                ]),
                technology: strings(&[
                    "AI",
                    "人工知能",
                    "生成AI",
                    "機械学習",
                    "デジタルヘルス",
                    "遠隔診療",
                    "リモートモニタリング",
                    "転倒検知",
                    "センサー",
                    "見守りシステム",
                    "telemedicine",
                    "digital health",
                    "machine learning",
                    "LLM",
                    "gen AI",
                    "remote monitoring",
                    "fall detection",
                ]),
            },
            domains: DomainLists {
                strong_allow,
                semi_allow,
                deny,
            },
            trust: TrustTable {
                max_weight: 5.0,
                weights,
            },
            region: RegionRules {
                domestic_suffixes: strings(&[".jp", ".go.jp", ".lg.jp", ".co.jp", ".or.jp", ".ne.jp"]),
                domestic_exceptions: strings(&["japantimes.co.jp"]),
            },
            scoring: ScoringWeights {
                relevance: 3.1,
                freshness: 0.0,
                trust: 0.2,
                freshness_horizon_hours: 168.0,
            },
            dedup: DedupParams {
                title_similarity_threshold: 0.85,
            },
        }
    }

    /// Parse from TOML. Missing sections fall back to the seed tables.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: CurationConfig = toml::from_str(s).context("parsing curation toml")?;
        Ok(cfg.sanitized())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading curation config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CURATION_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!(
                    "{ENV_CURATION_CONFIG_PATH} points to non-existent path"
                ));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CURATION_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default_seed())
    }

    /// Trim/lowercase domain lists, clamp numeric knobs into sane ranges.
    fn sanitized(mut self) -> Self {
        self.domains.strong_allow = clean_domains(self.domains.strong_allow);
        self.domains.semi_allow = clean_domains(self.domains.semi_allow);
        self.domains.deny = clean_domains(self.domains.deny);
        self.region.domestic_exceptions = clean_domains(self.region.domestic_exceptions);
        self.region.domestic_suffixes = clean_domains(self.region.domestic_suffixes)
            .into_iter()
            .map(|s| {
                if s.starts_with('.') {
                    s
                } else {
                    format!(".{s}")
                }
            })
            .collect();
        self.keywords.topic = clean_keywords(self.keywords.topic);
        self.keywords.technology = clean_keywords(self.keywords.technology);
        self.trust.weights = self
            .trust
            .weights
            .into_iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v))
            .filter(|(k, _)| !k.is_empty())
            .collect();

        if !(self.trust.max_weight.is_finite() && self.trust.max_weight > 0.0) {
            self.trust.max_weight = 5.0;
        }
        self.window_days = self.window_days.max(0);
        let t = self.dedup.title_similarity_threshold;
        self.dedup.title_similarity_threshold = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.85 };
        if !(self.scoring.freshness_horizon_hours.is_finite()
            && self.scoring.freshness_horizon_hours > 0.0)
        {
            self.scoring.freshness_horizon_hours = 168.0;
        }
        self
    }
}

impl Default for Quotas {
    fn default() -> Self {
        CurationConfig::default_seed().quotas
    }
}

impl Default for TrustTable {
    fn default() -> Self {
        CurationConfig::default_seed().trust
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        CurationConfig::default_seed().scoring
    }
}

impl Default for DedupParams {
    fn default() -> Self {
        CurationConfig::default_seed().dedup
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Trim, lowercase, drop empties and duplicates, keep first-seen order.
fn clean_domains(items: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .map(|d| d.trim().trim_end_matches('/').to_ascii_lowercase())
        .filter(|d| !d.is_empty() && seen.insert(d.clone()))
        .collect()
}

/// Keywords keep their case (matching lowercases both sides); only trimming and dedup.
fn clean_keywords(items: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}
