// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

pub const ENV_AI_CONFIG_PATH: &str = "AI_CONFIG_PATH";
pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_daily_limit() -> u32 {
    200
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_concurrency() -> usize {
    3
}
fn default_temperature() -> f32 {
    0.2
}
fn default_cache_dir() -> String {
    "cache/ai".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiConfig {
    pub enabled: bool,
    /// "openai" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Real backend calls per day; cache hits are free.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Items summarized in parallel.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: default_provider(),
            model: default_model(),
            daily_limit: default_daily_limit(),
            api_key: String::new(),
            concurrency: default_concurrency(),
            temperature: default_temperature(),
            cache_dir: default_cache_dir(),
        }
    }
}

impl AiConfig {
    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AiConfig = serde_json::from_str(data)?;

        // Normalize provider
        cfg.provider = cfg.provider.trim().to_lowercase();

        // Resolve api key if "ENV"
        if cfg.api_key.trim().eq_ignore_ascii_case("env") {
            cfg.api_key = match cfg.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow::anyhow!("Missing OPENAI_API_KEY env var"))?,
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }

        cfg.concurrency = cfg.concurrency.clamp(1, 16);
        if !(0.0..=2.0).contains(&cfg.temperature) {
            cfg.temperature = default_temperature();
        }
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// `$AI_CONFIG_PATH`, else `config/ai.json`, else disabled defaults.
    pub fn load_default() -> anyhow::Result<Self> {
        if let Ok(p) = env::var(ENV_AI_CONFIG_PATH) {
            return Self::load_from_file(p);
        }
        if Path::new(DEFAULT_AI_CONFIG_PATH).exists() {
            return Self::load_from_file(DEFAULT_AI_CONFIG_PATH);
        }
        Ok(Self::default())
    }
}
