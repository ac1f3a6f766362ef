// src/ingest/providers/mod.rs
//! Source adapters plus the feed plumbing they share: body loading (HTTP or fixture)
//! and a namespace-agnostic RSS 2.0 / RSS 1.0 (RDF) / Atom parser.

pub mod google_news;
pub mod newsapi;
pub mod rss_feed;

use anyhow::{anyhow, Context, Result};
use metrics::{counter, histogram};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::time::Duration;

pub(crate) const USER_AGENT: &str =
    "eldercare-digest/0.1 (+https://github.com/eldercare-digest/eldercare-digest)";

/// Shared HTTP client settings for adapters.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(15))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Where an adapter reads its raw payload from.
pub enum Body {
    /// Pre-recorded payload (tests, offline runs).
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl Body {
    pub fn http(url: impl Into<String>) -> Self {
        Body::Http {
            url: url.into(),
            client: http_client(),
        }
    }

    pub(crate) async fn load(&self, provider: &str) -> Result<String> {
        match self {
            Body::Fixture(s) => Ok(s.clone()),
            Body::Http { url, client } => {
                let resp = client
                    .get(url)
                    .send()
                    .await
                    .with_context(|| format!("{provider} http get()"))?
                    .error_for_status()
                    .with_context(|| format!("{provider} non-2xx"))?;
                resp.text()
                    .await
                    .with_context(|| format!("{provider} http .text()"))
            }
        }
    }
}

/// One `<item>`/`<entry>` with the fields adapters care about.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub date: Option<String>,
    pub description: String,
    /// `<source>` element (search feeds name the publisher there).
    pub source: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub items: Vec<FeedItem>,
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn href_of(e: &BytesStart<'_>) -> Option<String> {
    e.try_get_attribute("href")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parse RSS 2.0, RSS 1.0 (RDF) and Atom. Element names are matched on their local part,
/// so `dc:date` and `content:encoded` need no namespace setup.
pub fn parse_feed(xml: &str) -> Result<ParsedFeed> {
    let t0 = std::time::Instant::now();
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed = ParsedFeed::default();
    let mut current: Option<FeedItem> = None;
    let mut text = String::new();
    let mut depth_names: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if name == "item" || name == "entry" {
                    current = Some(FeedItem::default());
                } else if name == "link" {
                    if let (Some(it), Some(href)) = (current.as_mut(), href_of(&e)) {
                        it.link = href;
                    }
                }
                depth_names.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                // Atom: <link rel="alternate" href="..."/>
                if local_name(&e) == "link" {
                    if let (Some(it), Some(href)) = (current.as_mut(), href_of(&e)) {
                        if it.link.is_empty() {
                            it.link = href;
                        }
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let s = match t.unescape() {
                    Ok(c) => c.into_owned(),
                    // Feeds routinely carry HTML-only entities such as &nbsp;
                    Err(_) => html_escape::decode_html_entities(&String::from_utf8_lossy(&t))
                        .into_owned(),
                };
                text.push_str(&s);
            }
            Ok(Event::CData(c)) => text.push_str(&String::from_utf8_lossy(&c)),
            Ok(Event::End(_)) => {
                let name = depth_names.pop().unwrap_or_default();
                let value = std::mem::take(&mut text).trim().to_string();
                if name == "item" || name == "entry" {
                    if let Some(it) = current.take() {
                        feed.items.push(it);
                    }
                } else if let Some(it) = current.as_mut() {
                    match name.as_str() {
                        "title" if it.title.is_empty() => it.title = value,
                        "link" if it.link.is_empty() => it.link = value,
                        "pubDate" | "date" | "published" | "updated" | "issued"
                            if it.date.is_none() && !value.is_empty() =>
                        {
                            it.date = Some(value)
                        }
                        "description" | "summary" | "encoded" | "content"
                            if it.description.is_empty() =>
                        {
                            it.description = value
                        }
                        "source" if it.source.is_none() && !value.is_empty() => {
                            it.source = Some(value)
                        }
                        _ => {}
                    }
                } else {
                    let parent = depth_names.last().map(String::as_str);
                    if name == "title"
                        && feed.title.is_none()
                        && matches!(parent, Some("channel") | Some("feed"))
                    {
                        feed.title = Some(value);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(anyhow!(
                    "feed xml error at position {}: {e}",
                    reader.error_position()
                ))
            }
            _ => {}
        }
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_events_total").increment(feed.items.len() as u64);
    Ok(feed)
}
