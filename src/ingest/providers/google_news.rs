// src/ingest/providers/google_news.rs
//! Search-style feed: a keyword query rendered into a Google News RSS search URL.
//! Each query carries the region it was written for, so its items arrive pre-tagged.

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{parse_feed, Body};
use crate::ingest::normalize::{parse_timestamp, resolve_redirector};
use crate::ingest::types::{Candidate, Region, SourceProvider};

const SEARCH_ENDPOINT: &str = "https://news.google.com/rss/search";

/// Query parameters for one search feed.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, PartialEq)]
pub struct SearchQuery {
    pub query: String,
    /// Interface language, e.g. "ja" / "en".
    pub hl: String,
    /// Country, e.g. "JP" / "US".
    pub gl: String,
    pub region: Region,
    /// Restrict results to these domains with `site:` clauses.
    #[serde(default)]
    pub restrict_to_sites: Vec<String>,
}

impl SearchQuery {
    /// Full query string including `(site:a OR site:b)` when sites are given.
    pub fn rendered(&self) -> String {
        if self.restrict_to_sites.is_empty() {
            return self.query.clone();
        }
        let sites = self
            .restrict_to_sites
            .iter()
            .map(|d| format!("site:{d}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!("{} ({sites})", self.query)
    }

    pub fn url(&self) -> String {
        let ceid = format!("{}:{}", self.gl, self.hl);
        format!(
            "{SEARCH_ENDPOINT}?q={}&hl={}&gl={}&ceid={}",
            urlencode(&self.rendered()),
            urlencode(&self.hl),
            urlencode(&self.gl),
            urlencode(&ceid)
        )
    }
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

pub struct GoogleNewsProvider {
    name: String,
    query: SearchQuery,
    body: Body,
}

impl GoogleNewsProvider {
    pub fn new(query: SearchQuery) -> Self {
        let body = Body::http(query.url());
        Self {
            name: format!("google-news:{}", query.region.as_str()),
            query,
            body,
        }
    }

    pub fn from_fixture(query: SearchQuery, xml: &str) -> Self {
        Self {
            name: format!("google-news:{}", query.region.as_str()),
            query,
            body: Body::Fixture(xml.to_string()),
        }
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<Candidate>> {
        let feed = parse_feed(s).with_context(|| format!("parsing {}", self.name))?;
        let feed_title = feed
            .title
            .as_deref()
            .map(strip_feed_prefix)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Google News".to_string());

        Ok(feed
            .items
            .into_iter()
            .map(|it| Candidate {
                title: it.title,
                link: resolve_redirector(&it.link),
                published_at: it.date.as_deref().and_then(parse_timestamp),
                source_name: it.source.unwrap_or_else(|| feed_title.clone()),
                snippet: it.description,
                region: Some(self.query.region),
            })
            .collect())
    }
}

fn strip_feed_prefix(title: &str) -> String {
    let t = title.trim();
    let lower = t.to_ascii_lowercase();
    if lower.starts_with("google news - ") {
        t["google news - ".len()..].trim().to_string()
    } else {
        t.to_string()
    }
}

#[async_trait]
impl SourceProvider for GoogleNewsProvider {
    async fn fetch_latest(&self) -> Result<Vec<Candidate>> {
        let body = self.body.load(&self.name).await?;
        self.parse_items_from_str(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
