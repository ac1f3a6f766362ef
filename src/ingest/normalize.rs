// src/ingest/normalize.rs
//! Normalizer: link canonicalization, redirector resolution, timestamp coercion and
//! snippet cleanup. Everything here is total: bad input degrades, it never errors.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use url::Url;

use crate::ingest::types::Candidate;

/// Hosts that wrap the real article link in a query parameter.
const REDIRECTORS: &[(&str, &[&str])] = &[
    ("news.google.com", &["url"]),
    ("www.google.com", &["url", "q"]),
    ("google.com", &["url", "q"]),
];

/// Snippets longer than this are cut (chars).
const SNIPPET_CAP: usize = 1500;

/// Normalize text: decode entities, strip tags, fold quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > SNIPPET_CAP {
        out = out.chars().take(SNIPPET_CAP).collect();
    }
    out
}

/// Host of an absolute URL, lowercased; empty when unparseable.
pub fn host_of(link: &str) -> String {
    Url::parse(link)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Unwrap links such as `https://news.google.com/...?url=<real>`.
/// Returns the input unchanged when it is not a known redirector.
pub fn resolve_redirector(link: &str) -> String {
    let Ok(u) = Url::parse(link.trim()) else {
        return link.to_string();
    };
    let host = u.host_str().unwrap_or_default().to_ascii_lowercase();
    for (redirector, params) in REDIRECTORS {
        if host != *redirector {
            continue;
        }
        for p in *params {
            if let Some((_, real)) = u.query_pairs().find(|(k, _)| k == p) {
                if Url::parse(&real).is_ok() {
                    return real.into_owned();
                }
            }
        }
    }
    link.to_string()
}

/// Canonical form used for comparison and dedup: redirector unwrapped, fragment dropped,
/// `utm_*` query params dropped, no dangling `?`/`&`, no trailing `/` (a bare origin
/// loses its root slash too). Other params keep their raw encoding.
pub fn canonicalize_link(link: &str) -> String {
    let resolved = resolve_redirector(link.trim());
    match Url::parse(&resolved) {
        Ok(mut u) => {
            u.set_fragment(None);
            let kept: Vec<String> = u
                .query()
                .unwrap_or_default()
                .split('&')
                .filter(|seg| !seg.is_empty() && !is_tracking_param(seg))
                .map(str::to_string)
                .collect();
            if kept.is_empty() {
                u.set_query(None);
            } else {
                u.set_query(Some(&kept.join("&")));
            }
            let trimmed = u.path().trim_end_matches('/').to_string();
            if !trimmed.is_empty() {
                u.set_path(&trimmed);
            }
            let mut out = u.to_string();
            if u.query().is_none() && u.path() == "/" && out.ends_with('/') {
                out.pop();
            }
            out
        }
        Err(_) => canonicalize_raw(&resolved),
    }
}

fn is_tracking_param(segment: &str) -> bool {
    let key = segment.split('=').next().unwrap_or_default();
    key.to_ascii_lowercase().starts_with("utm_")
}

/// Best-effort string rewrite for links the URL parser rejects.
fn canonicalize_raw(link: &str) -> String {
    static RE_UTM: OnceCell<Regex> = OnceCell::new();
    let re_utm = RE_UTM.get_or_init(|| Regex::new(r"(?i)([?&])utm_[^&#]*").unwrap());

    let no_fragment = link.split('#').next().unwrap_or_default();
    let mut out = re_utm.replace_all(no_fragment, "$1").to_string();
    while out.contains("&&") || out.contains("?&") {
        out = out.replace("&&", "&").replace("?&", "?");
    }
    while (out.ends_with('?') || out.ends_with('&') || out.ends_with('/')) && !out.ends_with("://") {
        out.pop();
    }
    out
}

/// Coerce the timestamp formats seen in feeds and search APIs. Naive values are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(n) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(n.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| n.and_utc())
}

/// Apply link canonicalization and text cleanup to one adapter record.
pub fn normalize_candidate(mut c: Candidate) -> Candidate {
    c.title = normalize_text(&c.title);
    c.snippet = normalize_text(&c.snippet);
    c.source_name = c.source_name.trim().to_string();
    c.link = canonicalize_link(&c.link);
    c
}
