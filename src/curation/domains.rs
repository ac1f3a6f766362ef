// src/curation/domains.rs
//! Domain-list matching shared by the deny list, the allow tiers and trust lookup.
//!
//! An entry is a bare domain (`nature.com`) or a domain with a path prefix
//! (`apnews.com/press-release`). Domains match on label boundaries only.

use url::Url;

/// `host` equals `domain` or is a subdomain of it.
pub fn host_matches(host: &str, domain: &str) -> bool {
    if host == domain {
        return true;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRule {
    domain: String,
    path_prefix: Option<String>,
}

impl DomainRule {
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim().trim_end_matches('/').to_ascii_lowercase();
        let entry = entry
            .strip_prefix("https://")
            .or_else(|| entry.strip_prefix("http://"))
            .unwrap_or(&entry)
            .to_string();
        if entry.is_empty() {
            return None;
        }
        match entry.split_once('/') {
            Some((domain, path)) if !domain.is_empty() => Some(Self {
                domain: domain.to_string(),
                path_prefix: Some(format!("/{path}")),
            }),
            Some(_) => None,
            None => Some(Self {
                domain: entry,
                path_prefix: None,
            }),
        }
    }

    fn matches(&self, host: &str, path: &str) -> bool {
        if !host_matches(host, &self.domain) {
            return false;
        }
        match &self.path_prefix {
            None => true,
            Some(prefix) => path.to_ascii_lowercase().starts_with(prefix.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DomainList {
    rules: Vec<DomainRule>,
}

impl DomainList {
    pub fn new(entries: &[String]) -> Self {
        Self {
            rules: entries.iter().filter_map(|e| DomainRule::parse(e)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Unparseable links never match.
    pub fn matches(&self, link: &str) -> bool {
        let Ok(u) = Url::parse(link) else {
            return false;
        };
        let Some(host) = u.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        self.rules.iter().any(|r| r.matches(&host, u.path()))
    }
}
