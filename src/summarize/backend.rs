//! Generative backend: provider abstraction + file cache + daily limit.
//!
//! Backends return the model's raw text. Nothing here trusts or interprets it; parsing
//! and repair happen in the generator and the sanitizer.

use std::fs;
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::ai::AiConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// One summarization call: instructions, the article context, and the output contract.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummaryRequest {
    pub system: String,
    pub user: String,
    /// JSON Schema the output is asked to follow. A request, not a guarantee.
    pub schema: Value,
}

pub type BackendFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Trait object used by the generator (and tests).
pub trait SummaryBackend: Send + Sync {
    fn complete<'a>(&'a self, req: &'a SummaryRequest) -> BackendFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
    /// The output for `req` did not parse; drop anything kept for it.
    fn discard(&self, _req: &SummaryRequest) {}
}

pub type DynBackend = Arc<dyn SummaryBackend>;

/// Factory: build a backend according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock`, returns a deterministic mock backend.
/// * Else if `config.enabled==false`, returns a disabled backend.
/// * Else builds the real provider wrapped with caching + daily limit.
pub fn build_backend(config: &AiConfig) -> DynBackend {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let client = CachingBackend::new(
            MockProvider::default(),
            PathBuf::from(&config.cache_dir).join("mock"),
            config.daily_limit,
        );
        return Arc::new(client);
    }

    if !config.enabled {
        return Arc::new(DisabledBackend);
    }

    match config.provider.as_str() {
        "openai" => {
            let provider = OpenAiProvider::new(&config.api_key, &config.model, config.temperature);
            Arc::new(CachingBackend::new(
                provider,
                PathBuf::from(&config.cache_dir),
                config.daily_limit,
            ))
        }
        other => {
            tracing::warn!(target: "summarize", provider = other, "unknown AI provider; summarization disabled");
            Arc::new(DisabledBackend)
        }
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does the actual remote call. Separated so the same caching
/// wrapper serves production and tests.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(&'a self, req: &'a SummaryRequest) -> BackendFuture<'a>;
    fn name(&self) -> &'static str;
    /// Distinguishes cache entries across models.
    fn cache_namespace(&self) -> String {
        self.name().to_string()
    }
}

/// OpenAI Chat Completions with `response_format = json_schema`.
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(api_key: &str, model: &str, temperature: f32) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(crate::ingest::providers::USER_AGENT)
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature,
        }
    }
}

impl Provider for OpenAiProvider {
    fn fetch<'a>(&'a self, req: &'a SummaryRequest) -> BackendFuture<'a> {
        Box::pin(async move {
            if self.api_key.is_empty() {
                return Err(anyhow!("openai api key is empty"));
            }

            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                response_format: Value,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: Option<String>,
            }

            let body = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: &req.system,
                    },
                    Msg {
                        role: "user",
                        content: &req.user,
                    },
                ],
                temperature: self.temperature,
                response_format: serde_json::json!({
                    "type": "json_schema",
                    "json_schema": { "name": "digest_item", "strict": true, "schema": req.schema }
                }),
            };

            let resp = self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .context("openai http post()")?
                .error_for_status()
                .context("openai non-2xx")?;
            let parsed: Resp = resp.json().await.context("openai response json")?;
            parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| anyhow!("openai returned no content"))
        })
    }
    fn name(&self) -> &'static str {
        "openai"
    }
    fn cache_namespace(&self) -> String {
        format!("openai:{}:{}", self.model, self.temperature)
    }
}

/// Always fails; used when AI is disabled so every item takes the fallback path.
pub struct DisabledBackend;

impl SummaryBackend for DisabledBackend {
    fn complete<'a>(&'a self, _req: &'a SummaryRequest) -> BackendFuture<'a> {
        Box::pin(async { Err(anyhow!("summarization disabled")) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Fixed-output provider for tests/local runs.
#[derive(Clone)]
pub struct MockProvider {
    pub fixed: String,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self {
            fixed: serde_json::json!({
                "headline": "介護AIの動向(モック)",
                "summary": "モック応答です。高齢者介護の現場でAIを用いた見守りや転倒検知の導入が進んでいることを伝える記事の要約を想定した固定文です。",
                "tags": ["介護現場", "見守り", "医療AI"],
                "source": "",
                "url": ""
            })
            .to_string(),
        }
    }
}

impl Provider for MockProvider {
    fn fetch<'a>(&'a self, _req: &'a SummaryRequest) -> BackendFuture<'a> {
        let out = self.fixed.clone();
        Box::pin(async move { Ok(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching wrapper (file cache + daily limit)
// ------------------------------------------------------------

pub struct CachingBackend<P: Provider> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    counter: Arc<Mutex<DailyCounter>>,
}

impl<P: Provider> CachingBackend<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        let _ = fs::create_dir_all(&cache_dir); // best-effort
        let counter = Arc::new(Mutex::new(
            load_daily_counter(&cache_dir).unwrap_or_default(),
        ));
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            counter,
        }
    }

    /// Real calls made today.
    pub fn calls_today(&self) -> u32 {
        self.counter.lock().map(|g| g.count).unwrap_or(0)
    }

    async fn complete_impl(&self, req: &SummaryRequest) -> Result<String> {
        // 1) Cache lookup; hits do not count against the limit.
        let key = cache_key(&self.inner.cache_namespace(), req);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            tracing::debug!(target: "summarize", key = %key, "cache hit");
            return Ok(hit);
        }

        // 2) Daily limit.
        {
            let mut g = self
                .counter
                .lock()
                .map_err(|_| anyhow!("daily counter poisoned"))?;
            if g.is_expired() {
                g.reset_to_today();
                let _ = save_daily_counter(&self.cache_dir, &g);
            }
            if g.count >= self.daily_limit_max {
                return Err(anyhow!(
                    "daily AI call limit reached ({})",
                    self.daily_limit_max
                ));
            }
            // Reserve the slot before the await so parallel items cannot overshoot.
            g.count = g.count.saturating_add(1);
            let _ = save_daily_counter(&self.cache_dir, &g);
        }

        // 3) Real call.
        let text = self.inner.fetch(req).await?;
        if let Err(e) = write_cache_file(&self.cache_dir, &key, &text) {
            tracing::debug!(target: "summarize", error = ?e, "cache write failed");
        }
        Ok(text)
    }
}

impl<P: Provider> SummaryBackend for CachingBackend<P> {
    fn complete<'a>(&'a self, req: &'a SummaryRequest) -> BackendFuture<'a> {
        Box::pin(self.complete_impl(req))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
    fn discard(&self, req: &SummaryRequest) {
        let key = cache_key(&self.inner.cache_namespace(), req);
        match fs::remove_file(cache_path(&self.cache_dir, &key)) {
            Ok(()) => tracing::debug!(target: "summarize", key = %key, "cache entry discarded"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(target: "summarize", key = %key, error = ?e, "cache discard failed"),
        }
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

fn cache_key(namespace: &str, req: &SummaryRequest) -> String {
    let mut h = Sha256::new();
    h.update(namespace.as_bytes());
    h.update([0u8]);
    h.update(req.system.as_bytes());
    h.update([0u8]);
    h.update(req.user.as_bytes());
    h.update([0u8]);
    h.update(req.schema.to_string().as_bytes());
    format!("{:x}", h.finalize())
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    text: String,
}

fn read_cache_file(dir: &Path, key: &str) -> Option<String> {
    let mut file = fs::File::open(cache_path(dir, key)).ok()?;
    let mut buf = String::new();
    file.read_to_string(&mut buf).ok()?;
    serde_json::from_str::<CacheEntry>(&buf).ok().map(|e| e.text)
}

fn write_cache_file(dir: &Path, key: &str, text: &str) -> io::Result<()> {
    let path = cache_path(dir, key);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(&CacheEntry {
        text: text.to_string(),
    })
    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)?;
    Ok(())
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}
impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}
impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let p = counter_path(dir);
    let tmp = p.with_extension("json.tmp");
    let s = serde_json::to_string(dc).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut f = fs::File::create(&tmp)?;
    f.write_all(s.as_bytes())?;
    fs::rename(tmp, p)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Provider for Counting {
        fn fetch<'a>(&'a self, req: &'a SummaryRequest) -> BackendFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let out = format!("echo:{}", req.user);
            Box::pin(async move { Ok(out) })
        }
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn req(user: &str) -> SummaryRequest {
        SummaryRequest {
            system: "sys".into(),
            user: user.into(),
            schema: serde_json::json!({"type": "object"}),
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_provider() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let b = CachingBackend::new(
            Counting {
                calls: calls.clone(),
            },
            dir.path().to_path_buf(),
            10,
        );
        assert_eq!(b.complete(&req("a")).await.unwrap(), "echo:a");
        assert_eq!(b.complete(&req("a")).await.unwrap(), "echo:a");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls_today(), 1);
    }

    #[tokio::test]
    async fn limit_turns_into_error() {
        let dir = tempfile::tempdir().unwrap();
        let b = CachingBackend::new(
            Counting {
                calls: Arc::new(AtomicUsize::new(0)),
            },
            dir.path().to_path_buf(),
            1,
        );
        assert!(b.complete(&req("a")).await.is_ok());
        let err = b.complete(&req("b")).await.unwrap_err();
        assert!(err.to_string().contains("limit"));
        // cached entries still served past the limit
        assert!(b.complete(&req("a")).await.is_ok());
    }

    #[tokio::test]
    async fn discarded_entry_is_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let b = CachingBackend::new(
            Counting {
                calls: calls.clone(),
            },
            dir.path().to_path_buf(),
            10,
        );
        b.complete(&req("a")).await.unwrap();
        b.discard(&req("a"));
        b.discard(&req("never-cached"));
        b.complete(&req("a")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // a fresh result is cached again
        b.complete(&req("a")).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_always_errors() {
        assert!(DisabledBackend.complete(&req("x")).await.is_err());
    }
}
