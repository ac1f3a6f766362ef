// src/sanitize.rs
//! Output sanitizer for generated summaries.
//!
//! Whatever the generator produced (a JSON object, a partial one, garbage) is folded
//! into a [`RawSummary`] and then repaired field by field against the originating
//! [`Candidate`]. [`sanitize`] is total and idempotent: feeding its output back in
//! (with the same candidate and limits) returns the same record.

use chrono::{DateTime, FixedOffset, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

use crate::ingest::types::Candidate;

/// Target timezone for `publishedLocal` (UTC+09:00).
pub const LOCAL_OFFSET_SECS: i32 = 9 * 3600;
pub const UNKNOWN: &str = "unknown";
const SUMMARY_PLACEHOLDER: &str = "詳細は元記事のリンク先をご確認ください。";
const HEADLINE_PLACEHOLDER: &str = "(無題)";

/// Hard bounds enforced on every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLimits {
    pub headline_max: usize,
    pub summary_min: usize,
    pub summary_max: usize,
    pub tags_max: usize,
    pub tag_len_max: usize,
    pub source_len_max: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            headline_max: 40,
            summary_min: 20,
            summary_max: 200,
            tags_max: 5,
            tag_len_max: 15,
            source_len_max: 100,
        }
    }
}

/// Generator output before validation. Every field may be missing or wrong.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSummary {
    pub headline: Option<String>,
    pub summary: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub url: Option<String>,
}

impl RawSummary {
    /// Lenient extraction from arbitrary JSON. Accepts the field aliases generators tend
    /// to use (`jp_title`, `jp_summary`, `link`, ...) and tags given either as an array
    /// or as one delimited string. Non-objects yield an empty summary.
    pub fn from_value(v: &Value) -> Self {
        let Some(obj) = v.as_object() else {
            return Self::default();
        };
        let pick = |keys: &[&str]| keys.iter().find_map(|k| obj.get(*k).and_then(as_text));

        let tags = match ["tags", "tag", "hashtags"]
            .iter()
            .find_map(|k| obj.get(*k))
        {
            Some(Value::Array(items)) => items.iter().filter_map(as_text).collect(),
            Some(Value::String(s)) => s
                .split([',', '、', '，', '\n'])
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };

        Self {
            headline: pick(&["headline", "jp_title", "title"]),
            summary: pick(&["summary", "jp_summary", "description"]),
            tags,
            source: pick(&["sourceDomain", "source_domain", "source"]),
            url: pick(&["url", "link"]),
        }
    }
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A record that satisfies every output rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub headline: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub source_domain: String,
    pub url: String,
    pub published_local: String,
}

impl From<&SummaryRecord> for RawSummary {
    fn from(r: &SummaryRecord) -> Self {
        Self {
            headline: Some(r.headline.clone()),
            summary: Some(r.summary.clone()),
            tags: r.tags.clone(),
            source: Some(r.source_domain.clone()),
            url: Some(r.url.clone()),
        }
    }
}

/// Repair `raw` into a valid record. Never fails.
pub fn sanitize(raw: &RawSummary, candidate: &Candidate, limits: &OutputLimits) -> SummaryRecord {
    let url = sanitize_url(raw.url.as_deref(), &candidate.link);
    let source_domain = sanitize_source(raw.source.as_deref(), &url, &candidate.source_name, limits);
    SummaryRecord {
        headline: sanitize_headline(raw.headline.as_deref(), candidate, limits),
        summary: sanitize_summary(raw.summary.as_deref(), candidate, limits),
        tags: sanitize_tags(&raw.tags, limits),
        source_domain,
        url,
        published_local: published_local(candidate.published_at),
    }
}

/// `YYYY-MM-DD HH:MM` in UTC+09:00, or `unknown`.
pub fn published_local(ts: Option<DateTime<Utc>>) -> String {
    let Some(ts) = ts else {
        return UNKNOWN.to_string();
    };
    match FixedOffset::east_opt(LOCAL_OFFSET_SECS) {
        Some(off) => ts.with_timezone(&off).format("%Y-%m-%d %H:%M").to_string(),
        None => UNKNOWN.to_string(),
    }
}

/// Strip control characters and collapse whitespace runs.
fn clean_text(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut to `max` chars; never leaves trailing whitespace.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max).collect::<String>().trim_end().to_string()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn sanitize_headline(raw: Option<&str>, c: &Candidate, limits: &OutputLimits) -> String {
    let chosen = raw
        .map(clean_text)
        .and_then(non_empty)
        .or_else(|| non_empty(clean_text(&c.title)))
        .unwrap_or_else(|| HEADLINE_PLACEHOLDER.to_string());
    truncate_chars(&chosen, limits.headline_max)
}

fn sanitize_summary(raw: Option<&str>, c: &Candidate, limits: &OutputLimits) -> String {
    let long_enough = |s: &String| s.chars().count() >= limits.summary_min;

    if let Some(s) = raw.map(clean_text).filter(long_enough) {
        return truncate_chars(&s, limits.summary_max);
    }
    let snippet = clean_text(&c.snippet);
    if long_enough(&snippet) {
        return truncate_chars(&snippet, limits.summary_max);
    }
    // Too little material: stitch what there is and close with a pointer to the article.
    let title = clean_text(&c.title);
    let stitched = [title.as_str(), snippet.as_str(), SUMMARY_PLACEHOLDER]
        .iter()
        .filter(|s| !s.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    truncate_chars(&stitched, limits.summary_max)
}

fn is_boolean_token(s: &str) -> bool {
    matches!(s.to_ascii_uppercase().as_str(), "AND" | "OR" | "NOT")
}

fn has_scheme(s: &str) -> bool {
    let l = s.to_ascii_lowercase();
    l.contains("://") || l.starts_with("http") || l.starts_with("www.") || l.contains("site:")
}

const TAG_FORBIDDEN: &[char] = &[
    ':', '/', '\\', '(', ')', '[', ']', '{', '}', '"', '\'', '<', '>', '|', '!', '?', '。', '、',
    ',', ';', '#', '@', '=', '&', '*', '+', '.', '（', '）', '「', '」', '：', '！', '？', '，',
];

fn tag_is_valid(tag: &str, limits: &OutputLimits) -> bool {
    !tag.is_empty()
        && tag.chars().count() <= limits.tag_len_max
        && !tag.chars().any(char::is_whitespace)
        && !is_boolean_token(tag)
        && !has_scheme(tag)
        && !tag.contains(TAG_FORBIDDEN)
}

/// Drop invalid entries, dedup by exact match (first wins), cap the count.
pub fn sanitize_tags(tags: &[String], limits: &OutputLimits) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| t.trim().trim_start_matches(['#', '＃']).to_string())
        .filter(|t| tag_is_valid(t, limits))
        .filter(|t| seen.insert(t.clone()))
        .take(limits.tags_max)
        .collect()
}

/// A bare publisher/domain name, not a sentence, query or URL.
pub fn source_is_valid(s: &str, limits: &OutputLimits) -> bool {
    source_shape_is_valid(s, limits) && !has_scheme(s)
}

/// The sentence and punctuation rules alone. Hosts parsed out of a URL only need these.
fn source_shape_is_valid(s: &str, limits: &OutputLimits) -> bool {
    static RE_SENTENCE: OnceCell<Regex> = OnceCell::new();
    let re_sentence =
        RE_SENTENCE.get_or_init(|| Regex::new(r"[。．！？!?、,;]|\.\s|\.$|\s{2,}").unwrap());
    static RE_BOOL: OnceCell<Regex> = OnceCell::new();
    let re_bool = RE_BOOL.get_or_init(|| Regex::new(r"(?i)\b(AND|OR|NOT)\b").unwrap());

    !s.is_empty()
        && s.chars().count() <= limits.source_len_max
        && !re_sentence.is_match(s)
        && !s.contains(['#', '＃'])
        && !s.contains(['(', ')', '（', '）', '"', '\'', '「', '」', ':', '：'])
        && !re_bool.is_match(s)
}

fn sanitize_source(raw: Option<&str>, url: &str, fallback_name: &str, limits: &OutputLimits) -> String {
    if let Some(s) = raw.map(str::trim).filter(|s| source_is_valid(s, limits)) {
        return s.to_string();
    }
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default();
    if source_shape_is_valid(&host, limits) {
        return host;
    }
    let name = fallback_name.trim();
    if source_is_valid(name, limits) {
        return name.to_string();
    }
    UNKNOWN.to_string()
}

fn url_is_valid(s: &str) -> bool {
    if s.is_empty() || s.chars().any(char::is_whitespace) {
        return false;
    }
    match Url::parse(s) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

fn sanitize_url(raw: Option<&str>, candidate_link: &str) -> String {
    match raw.map(str::trim) {
        Some(s) if url_is_valid(s) => s.to_string(),
        _ => candidate_link.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn cand() -> Candidate {
        Candidate::new("介護施設でAI見守りを導入", "https://www.example.co.jp/a/b")
            .source("Example News")
            .snippet("全国の介護施設で、AIを使った見守りシステムの導入が進んでいる。転倒検知の精度向上が背景にある。")
            .published(Utc.with_ymd_and_hms(2025, 9, 1, 15, 30, 0).unwrap())
    }

    #[test]
    fn jst_rendering() {
        let ts = Utc.with_ymd_and_hms(2025, 9, 1, 15, 30, 0).unwrap();
        assert_eq!(published_local(Some(ts)), "2025-09-02 00:30");
        assert_eq!(published_local(None), "unknown");
    }

    #[test]
    fn tags_from_delimited_string() {
        let raw = RawSummary::from_value(&json!({"jp_title": "見出し", "tags": "介護DX、遠隔診療, AI"}));
        assert_eq!(raw.headline.as_deref(), Some("見出し"));
        let tags = sanitize_tags(&raw.tags, &OutputLimits::default());
        assert_eq!(tags, vec!["介護DX", "遠隔診療", "AI"]);
    }

    #[test]
    fn non_object_is_empty() {
        assert_eq!(RawSummary::from_value(&json!([1, 2])), RawSummary::default());
        assert_eq!(RawSummary::from_value(&json!("text")), RawSummary::default());
    }

    #[test]
    fn hash_prefix_is_stripped() {
        let tags = sanitize_tags(
            &["#認知症ケア".into(), "＃医療AI".into(), "#".into()],
            &OutputLimits::default(),
        );
        assert_eq!(tags, vec!["認知症ケア", "医療AI"]);
    }

    #[test]
    fn invalid_url_falls_back_to_candidate() {
        let raw = RawSummary {
            url: Some("javascript:alert(1)".into()),
            ..Default::default()
        };
        let r = sanitize(&raw, &cand(), &OutputLimits::default());
        assert_eq!(r.url, "https://www.example.co.jp/a/b");
    }

    #[test]
    fn short_summary_uses_snippet() {
        let raw = RawSummary {
            summary: Some("短い".into()),
            ..Default::default()
        };
        let r = sanitize(&raw, &cand(), &OutputLimits::default());
        assert!(r.summary.starts_with("全国の介護施設で"));
    }

    #[test]
    fn nothing_to_work_with_still_meets_minimum() {
        let c = Candidate::new("", "https://x.ex/1");
        let r = sanitize(&RawSummary::default(), &c, &OutputLimits::default());
        assert!(r.summary.chars().count() >= 20);
        assert_eq!(r.headline, "(無題)");
        assert_eq!(r.source_domain, "x.ex");
        assert_eq!(r.published_local, "unknown");
    }

    #[test]
    fn www_host_from_url_is_kept() {
        let raw = RawSummary {
            source: Some("この記事は〜について説明しています。".into()),
            ..Default::default()
        };
        let c = Candidate::new("見出し", "https://www.example.co.jp/a/b");
        let limits = OutputLimits::default();
        let r = sanitize(&raw, &c, &limits);
        assert_eq!(r.source_domain, "www.example.co.jp");
        assert_eq!(sanitize(&RawSummary::from(&r), &c, &limits), r);
    }

    #[test]
    fn www_value_from_generator_is_not_trusted() {
        let raw = RawSummary {
            source: Some("www.other.example.com".into()),
            ..Default::default()
        };
        let r = sanitize(&raw, &cand(), &OutputLimits::default());
        assert_eq!(r.source_domain, "www.example.co.jp");
        assert!(!source_is_valid("www.other.example.com", &OutputLimits::default()));
    }
}
