// src/ingest/providers/newsapi.rs
//! Keyword search API adapter (NewsAPI `/v2/everything`).
//! Without an API key the adapter is inert and yields nothing.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;

use super::http_client;
use crate::ingest::normalize::parse_timestamp;
use crate::ingest::types::{Candidate, SourceProvider};

const ENDPOINT: &str = "https://newsapi.org/v2/everything";
const PAGE_SIZE: &str = "50";

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize, PartialEq)]
pub struct NewsApiQuery {
    pub q: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct Resp {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
    description: Option<String>,
    source: Option<ArticleSource>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

enum Mode {
    Fixture(Vec<String>),
    Http {
        api_key: Option<String>,
        client: reqwest::Client,
    },
}

pub struct NewsApiProvider {
    queries: Vec<NewsApiQuery>,
    window_days: i64,
    mode: Mode,
}

impl NewsApiProvider {
    pub fn new(api_key: Option<String>, queries: Vec<NewsApiQuery>, window_days: i64) -> Self {
        Self {
            queries,
            window_days,
            mode: Mode::Http {
                api_key: api_key.filter(|k| !k.trim().is_empty()),
                client: http_client(),
            },
        }
    }

    /// One JSON response body per query, returned in order.
    pub fn from_fixtures(bodies: Vec<String>) -> Self {
        Self {
            queries: Vec::new(),
            window_days: 7,
            mode: Mode::Fixture(bodies),
        }
    }

    /// `from` date for the query window (YYYY-MM-DD).
    fn from_date(&self, now: DateTime<Utc>) -> String {
        (now - ChronoDuration::days(self.window_days))
            .format("%Y-%m-%d")
            .to_string()
    }

    fn parse_items_from_str(s: &str) -> Result<Vec<Candidate>> {
        let resp: Resp = serde_json::from_str(s).context("parsing newsapi json")?;
        Ok(resp
            .articles
            .into_iter()
            .map(|a| Candidate {
                title: a.title.unwrap_or_default(),
                link: a.url.unwrap_or_default(),
                published_at: a.published_at.as_deref().and_then(parse_timestamp),
                source_name: a
                    .source
                    .and_then(|s| s.name)
                    .unwrap_or_else(|| "NewsAPI".to_string()),
                snippet: a.description.unwrap_or_default(),
                region: None,
            })
            .collect())
    }

    async fn call(
        &self,
        client: &reqwest::Client,
        api_key: &str,
        query: &NewsApiQuery,
    ) -> Result<Vec<Candidate>> {
        let from = self.from_date(Utc::now());
        let resp = client
            .get(ENDPOINT)
            .header("X-Api-Key", api_key)
            .query(&[
                ("q", query.q.as_str()),
                ("language", query.language.as_str()),
                ("sortBy", "publishedAt"),
                ("pageSize", PAGE_SIZE),
                ("from", from.as_str()),
                ("searchIn", "title,description,content"),
            ])
            .send()
            .await
            .context("newsapi http get()")?;
        let status = resp.status();
        let body = resp.text().await.context("newsapi http .text()")?;
        if !status.is_success() {
            return Err(anyhow!("newsapi status {status}: {}", truncate(&body, 200)));
        }
        Self::parse_items_from_str(&body)
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[async_trait]
impl SourceProvider for NewsApiProvider {
    async fn fetch_latest(&self) -> Result<Vec<Candidate>> {
        match &self.mode {
            Mode::Fixture(bodies) => {
                let mut out = Vec::new();
                for b in bodies {
                    out.extend(Self::parse_items_from_str(b)?);
                }
                Ok(out)
            }
            Mode::Http { api_key, client } => {
                let Some(key) = api_key else {
                    tracing::debug!(target: "ingest", "NewsAPI disabled (no NEWSAPI_KEY)");
                    return Ok(Vec::new());
                };
                // A failing query is skipped; the other language still contributes.
                let mut out = Vec::new();
                for q in &self.queries {
                    match self.call(client, key, q).await {
                        Ok(mut v) => out.append(&mut v),
                        Err(e) => {
                            tracing::warn!(target: "ingest", error = ?e, language = %q.language, "newsapi query failed")
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    fn name(&self) -> &str {
        "newsapi"
    }
}
