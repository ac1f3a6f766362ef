// src/ingest/config.rs
//! Which sources to poll: plain feeds, search feeds, and keyword-API queries.
//!
//! Lookup order for [`SourcesConfig::load_default`]:
//! 1) `$SOURCES_CONFIG_PATH` (must exist)
//! 2) `config/sources.toml`
//! 3) built-in [`SourcesConfig::default_seed`]

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::providers::google_news::{GoogleNewsProvider, SearchQuery};
use crate::ingest::providers::newsapi::{NewsApiProvider, NewsApiQuery};
use crate::ingest::providers::rss_feed::RssFeedProvider;
use crate::ingest::types::{Region, SourceProvider};

pub const ENV_SOURCES_CONFIG_PATH: &str = "SOURCES_CONFIG_PATH";
pub const DEFAULT_SOURCES_CONFIG_PATH: &str = "config/sources.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchFeedConfig {
    #[serde(flatten)]
    pub query: SearchQuery,
    /// Append `site:` clauses for every strong-allow domain.
    #[serde(default)]
    pub use_allow_list: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct SourcesConfig {
    /// RSS 2.0 / RDF / Atom feed URLs.
    pub feeds: Vec<String>,
    pub search_feeds: Vec<SearchFeedConfig>,
    pub newsapi: Vec<NewsApiQuery>,
}

impl SourcesConfig {
    pub fn default_seed() -> Self {
        Self {
            feeds: vec![
                "https://www.mhlw.go.jp/stf/news.rdf".to_string(),
                "https://rss.itmedia.co.jp/rss/2.0/news_bursts.xml".to_string(),
            ],
            search_feeds: vec![
                SearchFeedConfig {
                    query: SearchQuery {
                        query: r#"("高齢者" OR "介護" OR "在宅医療" OR "認知症") (AI OR "人工知能" OR "生成AI" OR "デジタルヘルス" OR "遠隔診療")"#.to_string(),
                        hl: "ja".to_string(),
                        gl: "JP".to_string(),
                        region: Region::Domestic,
                        restrict_to_sites: Vec::new(),
                    },
                    use_allow_list: false,
                },
                SearchFeedConfig {
                    query: SearchQuery {
                        query: r#"(elderly OR seniors OR geriatric OR "nursing home" OR "long-term care" OR "older adults" OR dementia) (AI OR "artificial intelligence" OR "digital health" OR telemedicine OR "fall detection" OR "remote monitoring")"#.to_string(),
                        hl: "en".to_string(),
                        gl: "US".to_string(),
                        region: Region::Overseas,
                        restrict_to_sites: Vec::new(),
                    },
                    use_allow_list: true,
                },
            ],
            newsapi: vec![
                NewsApiQuery {
                    q: "(高齢者 OR 介護 OR 老人 OR 在宅医療 OR 地域包括 OR 見守り OR 転倒 OR 認知症) AND (AI OR 人工知能 OR 生成AI OR デジタルヘルス OR 遠隔診療 OR データ分析 OR DX)".to_string(),
                    language: "ja".to_string(),
                },
                NewsApiQuery {
                    q: r#"(elderly OR seniors OR geriatric OR "nursing home" OR "long-term care") AND (AI OR "artificial intelligence" OR "digital health" OR telemedicine OR "fall detection")"#.to_string(),
                    language: "en".to_string(),
                },
            ],
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: SourcesConfig = toml::from_str(s).context("parsing sources toml")?;
        cfg.feeds = clean_list(cfg.feeds);
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading sources from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SOURCES_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!(
                    "{ENV_SOURCES_CONFIG_PATH} points to non-existent path"
                ));
            }
        }
        let default_p = PathBuf::from(DEFAULT_SOURCES_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default_seed())
    }

    /// Providers in merge order: keyword API, search feeds, plain feeds.
    pub fn build_providers(
        &self,
        newsapi_key: Option<String>,
        window_days: i64,
        strong_allow: &[String],
    ) -> Vec<Box<dyn SourceProvider>> {
        let mut out: Vec<Box<dyn SourceProvider>> = Vec::new();
        if !self.newsapi.is_empty() {
            out.push(Box::new(NewsApiProvider::new(
                newsapi_key,
                self.newsapi.clone(),
                window_days,
            )));
        }
        for sf in &self.search_feeds {
            let mut q = sf.query.clone();
            if sf.use_allow_list {
                q.restrict_to_sites.extend(
                    strong_allow
                        .iter()
                        // path-scoped entries cannot be expressed as site: clauses
                        .filter(|d| !d.contains('/'))
                        .cloned(),
                );
            }
            out.push(Box::new(GoogleNewsProvider::new(q)));
        }
        for url in &self.feeds {
            out.push(Box::new(RssFeedProvider::from_url(url)));
        }
        out
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::BTreeSet::new();
    items
        .into_iter()
        .map(|it| it.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    #[test]
    fn toml_with_flattened_search_feed() {
        let cfg = SourcesConfig::from_toml_str(
            r#"
feeds = [" https://a.ex/rss ", "", "https://a.ex/rss"]

[[search_feeds]]
query = "elderly AI"
hl = "en"
gl = "US"
region = "overseas"
use_allow_list = true
"#,
        )
        .unwrap();
        assert_eq!(cfg.feeds, vec!["https://a.ex/rss".to_string()]);
        assert_eq!(cfg.search_feeds[0].query.region, Region::Overseas);
        assert!(cfg.search_feeds[0].use_allow_list);
        assert!(cfg.newsapi.is_empty());
    }

    #[test]
    fn providers_follow_merge_order() {
        let cfg = SourcesConfig::default_seed();
        let ps = cfg.build_providers(None, 7, &["nature.com".to_string()]);
        let names: Vec<_> = ps.iter().map(|p| p.name().to_string()).collect();
        assert_eq!(
            names,
            vec![
                "newsapi",
                "google-news:domestic",
                "google-news:overseas",
                "www.mhlw.go.jp",
                "rss.itmedia.co.jp"
            ]
        );
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_SOURCES_CONFIG_PATH);

        // no files in the temp CWD → seed
        assert_eq!(SourcesConfig::load_default().unwrap(), SourcesConfig::default_seed());

        let p = tmp.path().join("s.toml");
        fs::write(&p, r#"feeds = ["https://x.ex/feed"]"#).unwrap();
        env::set_var(ENV_SOURCES_CONFIG_PATH, p.display().to_string());
        let v = SourcesConfig::load_default().unwrap();
        assert_eq!(v.feeds, vec!["https://x.ex/feed".to_string()]);

        env::set_var(ENV_SOURCES_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(SourcesConfig::load_default().is_err());
        env::remove_var(ENV_SOURCES_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
