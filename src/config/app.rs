// src/config/app.rs
//! Process settings read from the environment (a local `.env` is loaded by the binaries).

use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_TOPIC: &str = "高齢者医療×AI/IT";
pub const DEFAULT_REGISTRY_PATH: &str = "data/destinations.json";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub line_channel_access_token: String,
    pub newsapi_key: Option<String>,
    /// Shown in the digest preamble.
    pub topic: String,
    /// Forced default destination (`TEST_GROUP_ID` wins over `DEFAULT_TO`).
    pub default_to: Option<String>,
    pub registry_path: PathBuf,
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl AppConfig {
    /// Fails only when the LINE token is missing.
    pub fn from_env() -> Result<Self> {
        let line_channel_access_token = non_empty_var("LINE_CHANNEL_ACCESS_TOKEN")
            .ok_or_else(|| anyhow!("Missing LINE_CHANNEL_ACCESS_TOKEN env var"))?;
        Ok(Self {
            line_channel_access_token,
            newsapi_key: non_empty_var("NEWSAPI_KEY"),
            topic: non_empty_var("TOPIC").unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            default_to: non_empty_var("TEST_GROUP_ID").or_else(|| non_empty_var("DEFAULT_TO")),
            registry_path: non_empty_var("REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY_PATH)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: &[&str] = &[
        "LINE_CHANNEL_ACCESS_TOKEN",
        "NEWSAPI_KEY",
        "TOPIC",
        "TEST_GROUP_ID",
        "DEFAULT_TO",
        "REGISTRY_PATH",
    ];

    fn clear() {
        for k in KEYS {
            env::remove_var(k);
        }
    }

    #[serial_test::serial]
    #[test]
    fn token_is_required() {
        clear();
        assert!(AppConfig::from_env().is_err());
    }

    #[serial_test::serial]
    #[test]
    fn defaults_and_overrides() {
        clear();
        env::set_var("LINE_CHANNEL_ACCESS_TOKEN", "tok");
        env::set_var("DEFAULT_TO", "Cdef");
        env::set_var("NEWSAPI_KEY", "  ");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.topic, DEFAULT_TOPIC);
        assert_eq!(cfg.default_to.as_deref(), Some("Cdef"));
        assert!(cfg.newsapi_key.is_none());
        assert_eq!(cfg.registry_path, PathBuf::from(DEFAULT_REGISTRY_PATH));

        env::set_var("TEST_GROUP_ID", "Ctest");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.default_to.as_deref(), Some("Ctest"));
        clear();
    }
}
