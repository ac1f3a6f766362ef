// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which digest bucket a candidate belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Domestic,
    Overseas,
}

impl Region {
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Domestic => "domestic",
            Region::Overseas => "overseas",
        }
    }
}

/// A prospective news item as produced by a source adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub title: String,
    pub link: String, // canonicalized before any comparison
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String, // e.g. feed title, "NewsAPI"
    pub snippet: String,
    pub region: Option<Region>, // only when the source says so explicitly
}

impl Candidate {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            published_at: None,
            source_name: String::new(),
            snippet: String::new(),
            region: None,
        }
    }

    pub fn published(mut self, ts: DateTime<Utc>) -> Self {
        self.published_at = Some(ts);
        self
    }

    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }

    pub fn snippet(mut self, text: impl Into<String>) -> Self {
        self.snippet = text.into();
        self
    }

    pub fn region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Title and snippet joined, as used by keyword matching.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.snippet)
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<Candidate>>;
    fn name(&self) -> &str;
}
