// src/ingest/providers/rss_feed.rs
use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{parse_feed, Body};
use crate::ingest::normalize::parse_timestamp;
use crate::ingest::types::{Candidate, SourceProvider};

/// Structured feed (RSS 2.0 / RDF / Atom) from one publisher.
/// Region is left open; the curation step infers it from the link host.
pub struct RssFeedProvider {
    name: String,
    body: Body,
}

impl RssFeedProvider {
    pub fn from_url(url: &str) -> Self {
        Self {
            name: host_label(url),
            body: Body::http(url),
        }
    }

    pub fn from_fixture(name: &str, xml: &str) -> Self {
        Self {
            name: name.to_string(),
            body: Body::Fixture(xml.to_string()),
        }
    }

    fn parse_items_from_str(&self, s: &str) -> Result<Vec<Candidate>> {
        let feed = parse_feed(s).with_context(|| format!("parsing feed {}", self.name))?;
        let source = feed
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.name.clone());

        Ok(feed
            .items
            .into_iter()
            .map(|it| Candidate {
                title: it.title,
                link: it.link,
                published_at: it.date.as_deref().and_then(parse_timestamp),
                source_name: source.clone(),
                snippet: it.description,
                region: None,
            })
            .collect())
    }
}

fn host_label(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[async_trait]
impl SourceProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<Candidate>> {
        let body = self.body.load(&self.name).await?;
        self.parse_items_from_str(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
