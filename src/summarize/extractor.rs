// src/summarize/extractor.rs
//! Best-effort article text extraction. Never fails: an empty string means
//! "could not extract" and the generator falls back to title + snippet.

use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;

/// Upper bound on extracted text handed to the backend (chars).
pub const ARTICLE_TEXT_CAP: usize = 8000;

#[async_trait]
pub trait ArticleExtractor: Send + Sync {
    async fn extract(&self, url: &str) -> String;
}

/// Extracts nothing. Used for offline runs and tests.
pub struct NoopExtractor;

#[async_trait]
impl ArticleExtractor for NoopExtractor {
    async fn extract(&self, _url: &str) -> String {
        String::new()
    }
}

pub struct HttpExtractor {
    client: reqwest::Client,
    cap: usize,
}

impl Default for HttpExtractor {
    fn default() -> Self {
        Self::new(ARTICLE_TEXT_CAP)
    }
}

impl HttpExtractor {
    pub fn new(cap: usize) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(crate::ingest::providers::USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(12))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, cap }
    }

    async fn fetch_html(&self, url: &str) -> anyhow::Result<String> {
        use anyhow::Context;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("article http get()")?
            .error_for_status()
            .context("article non-2xx")?;
        let is_html = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);
        if !is_html {
            anyhow::bail!("not an html document");
        }
        resp.text().await.context("article http .text()")
    }
}

#[async_trait]
impl ArticleExtractor for HttpExtractor {
    async fn extract(&self, url: &str) -> String {
        match self.fetch_html(url).await {
            Ok(html) => readable_text(&html, self.cap),
            Err(e) => {
                tracing::warn!(target: "summarize", url, error = ?e, "article extraction failed");
                String::new()
            }
        }
    }
}

/// Paragraph text from `<article>`, else `<main>`, else every `<p>`; whitespace
/// collapsed, paragraphs joined by newlines, capped at `cap` chars.
pub fn readable_text(html: &str, cap: usize) -> String {
    let doc = Html::parse_document(html);
    for scope in ["article p", "main p", "p"] {
        let Ok(sel) = Selector::parse(scope) else {
            continue;
        };
        let paragraphs: Vec<String> = doc
            .select(&sel)
            .map(|p| {
                p.text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|t| !t.is_empty())
            .collect();
        if !paragraphs.is_empty() {
            let joined = paragraphs.join("\n");
            return joined.chars().take(cap).collect();
        }
    }
    String::new()
}
