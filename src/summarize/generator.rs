// src/summarize/generator.rs
//! Per-item summarization: extract → prompt → backend → parse → sanitize, with a
//! fallback record whenever the backend or the parse fails.

use futures::stream::{self, StreamExt};
use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::ingest::types::{Candidate, Region};
use crate::sanitize::{sanitize, truncate_chars, OutputLimits, RawSummary, SummaryRecord};
use crate::summarize::backend::{DynBackend, SummaryRequest};
use crate::summarize::extractor::{ArticleExtractor, ARTICLE_TEXT_CAP};

/// Why an item ended up with a synthesized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    Backend,
    Parse,
}

impl FallbackReason {
    fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::Backend => "backend",
            FallbackReason::Parse => "parse",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum SummaryOrigin {
    Generated,
    Fallback(FallbackReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummarizedItem {
    pub region: Region,
    pub origin: SummaryOrigin,
    #[serde(flatten)]
    pub record: SummaryRecord,
}

const SYSTEM_PROMPT: &str = "あなたは医療×AIの専門記者です。与えられたニュース本文を事実ベースで要約し、指定されたJSONだけを返してください。煽らず、固有名詞と具体的な数値を残し、誇張しないこと。";

/// JSON Schema asked of the backend.
pub fn response_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["headline", "summary", "tags", "source", "url"],
        "properties": {
            "headline": { "type": "string", "description": "20字以内の日本語見出し" },
            "summary": { "type": "string", "description": "120〜180字の日本語要約" },
            "tags": {
                "type": "array",
                "items": { "type": "string", "description": "空白・記号なしの短い日本語タグ" },
                "description": "3〜5個"
            },
            "source": { "type": "string", "description": "媒体名またはドメイン" },
            "url": { "type": "string" }
        }
    })
}

/// Body text when extraction worked, otherwise title + snippet.
pub fn context_for(c: &Candidate, article_text: &str) -> String {
    if article_text.trim().is_empty() {
        format!("{}\n\n{}", c.title, c.snippet)
    } else {
        truncate_chars(article_text, ARTICLE_TEXT_CAP)
    }
}

pub fn build_request(c: &Candidate, context: &str) -> SummaryRequest {
    let published = c
        .published_at
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string());
    let user = format!(
        "以下のニュースを要約し、次のキーを持つJSONで返してください。\n\
- headline: 20字以内の日本語見出し（煽らない・具体）\n\
- summary: 120〜180字の日本語要約\n\
- tags: 日本語タグを3〜5個（空白・記号・URL・AND/OR を含めない。例: 介護現場, 転倒予防, 遠隔診療, 認知症ケア, データ利活用）\n\
- source: 媒体名またはドメイン名のみ（文章にしない）\n\
- url: 下記URLをそのまま\n\n\
本文（最大{ARTICLE_TEXT_CAP}文字に整形済）:\n{context}\n\n\
URL: {}\nSOURCE: {}\nPUBLISHED(ISO): {published}",
        c.link, c.source_name
    );
    SummaryRequest {
        system: SYSTEM_PROMPT.to_string(),
        user,
        schema: response_schema(),
    }
}

/// Pull the first JSON object out of model text (code fences and chatter tolerated).
/// `None` unless it is an object carrying a headline or a summary.
pub fn parse_generated(text: &str) -> Option<RawSummary> {
    static RE_FENCE: OnceCell<Regex> = OnceCell::new();
    let re_fence =
        RE_FENCE.get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)\s*```").unwrap());

    let body = re_fence
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(text);

    let value: Value = serde_json::from_str(body.trim()).ok().or_else(|| {
        let start = body.find('{')?;
        let end = body.rfind('}')?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&body[start..=end]).ok()
    })?;
    if !value.is_object() {
        return None;
    }
    let raw = RawSummary::from_value(&value);
    if raw.headline.is_none() && raw.summary.is_none() {
        return None;
    }
    Some(raw)
}

/// Record built straight from the candidate, no tags.
pub fn fallback_raw(c: &Candidate, article_text: &str, limits: &OutputLimits) -> RawSummary {
    let body = if article_text.trim().is_empty() {
        c.snippet.as_str()
    } else {
        article_text
    };
    RawSummary {
        headline: Some(truncate_chars(c.title.trim(), limits.headline_max)),
        summary: Some(truncate_chars(body.trim(), limits.summary_max)),
        tags: Vec::new(),
        source: Some(c.source_name.clone()),
        url: Some(c.link.clone()),
    }
}

pub struct SummaryGenerator {
    backend: DynBackend,
    extractor: Arc<dyn ArticleExtractor>,
    limits: OutputLimits,
    concurrency: usize,
}

impl SummaryGenerator {
    pub fn new(backend: DynBackend, extractor: Arc<dyn ArticleExtractor>) -> Self {
        Self {
            backend,
            extractor,
            limits: OutputLimits::default(),
            concurrency: 3,
        }
    }

    pub fn with_limits(mut self, limits: OutputLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn limits(&self) -> &OutputLimits {
        &self.limits
    }

    /// Never fails; errors become a fallback record.
    pub async fn summarize_one(&self, c: &Candidate, region: Region) -> SummarizedItem {
        super::ensure_metrics_described();
        let article = self.extractor.extract(&c.link).await;
        let req = build_request(c, &context_for(c, &article));

        let (raw, origin) = match self.backend.complete(&req).await {
            Ok(text) => match parse_generated(&text) {
                Some(raw) => (raw, SummaryOrigin::Generated),
                None => {
                    tracing::warn!(target: "summarize", url = %c.link, "unparseable backend output");
                    self.backend.discard(&req);
                    (
                        fallback_raw(c, &article, &self.limits),
                        SummaryOrigin::Fallback(FallbackReason::Parse),
                    )
                }
            },
            Err(e) => {
                tracing::warn!(
                    target: "summarize",
                    url = %c.link,
                    provider = self.backend.provider_name(),
                    error = ?e,
                    "backend call failed"
                );
                (
                    fallback_raw(c, &article, &self.limits),
                    SummaryOrigin::Fallback(FallbackReason::Backend),
                )
            }
        };

        match origin {
            SummaryOrigin::Generated => counter!("summary_generated_total").increment(1),
            SummaryOrigin::Fallback(r) => {
                counter!("summary_fallback_total", "reason" => r.as_str()).increment(1)
            }
        }

        SummarizedItem {
            region,
            origin,
            record: sanitize(&raw, c, &self.limits),
        }
    }

    /// Bounded parallelism; output order equals input order.
    pub async fn summarize_all(&self, items: &[(Candidate, Region)]) -> Vec<SummarizedItem> {
        stream::iter(items.to_vec())
            .map(|(c, r)| async move { self.summarize_one(&c, r).await })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let text = "Here you go:\n```json\n{\"headline\":\"見出し\",\"summary\":\"本文\",\"tags\":[\"AI\"]}\n```";
        let raw = parse_generated(text).unwrap();
        assert_eq!(raw.headline.as_deref(), Some("見出し"));
        assert_eq!(raw.tags, vec!["AI"]);
    }

    #[test]
    fn parses_embedded_object() {
        let raw = parse_generated("結果: {\"jp_title\":\"t\",\"jp_summary\":\"s\"} 以上").unwrap();
        assert_eq!(raw.summary.as_deref(), Some("s"));
    }

    #[test]
    fn rejects_non_summaries() {
        assert!(parse_generated("no json here").is_none());
        assert!(parse_generated("[1,2,3]").is_none());
        assert!(parse_generated("{\"tags\":[\"AI\"]}").is_none());
        assert!(parse_generated("{broken").is_none());
    }

    #[test]
    fn context_prefers_article_text() {
        let c = Candidate::new("T", "https://x.ex/1").snippet("S");
        assert_eq!(context_for(&c, ""), "T\n\nS");
        assert_eq!(context_for(&c, "body"), "body");
        let long = "あ".repeat(9000);
        assert_eq!(context_for(&c, &long).chars().count(), ARTICLE_TEXT_CAP);
    }

    #[test]
    fn request_carries_contract() {
        let c = Candidate::new("T", "https://x.ex/1").source("X");
        let req = build_request(&c, "ctx");
        assert!(req.user.contains("URL: https://x.ex/1"));
        assert!(req.user.contains("ctx"));
        assert_eq!(req.schema["required"][0], "headline");
    }

    struct Scripted;

    impl crate::summarize::backend::SummaryBackend for Scripted {
        fn complete<'a>(&'a self, req: &'a SummaryRequest) -> crate::summarize::backend::BackendFuture<'a> {
            Box::pin(async move {
                if req.user.contains("/slow") {
                    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
                }
                if req.user.contains("/bad") {
                    return Ok("sorry, no summary".to_string());
                }
                Ok(r#"{"headline":"見守りAI","summary":"高齢者の見守りにAIを使う取り組みが広がっている。"}"#.to_string())
            })
        }

        fn provider_name(&self) -> &'static str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn summarize_all_keeps_order_and_isolates_failures() {
        let gen = SummaryGenerator::new(Arc::new(Scripted), Arc::new(crate::summarize::NoopExtractor))
            .with_concurrency(3);
        let items: Vec<(Candidate, Region)> = ["slow", "bad", "ok", "slow2"]
            .iter()
            .map(|p| {
                (
                    Candidate::new(format!("title {p}"), format!("https://x.ex/{p}")),
                    Region::Overseas,
                )
            })
            .collect();

        let out = gen.summarize_all(&items).await;
        let urls: Vec<_> = out.iter().map(|i| i.record.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://x.ex/slow", "https://x.ex/bad", "https://x.ex/ok", "https://x.ex/slow2"]
        );
        assert_eq!(out[1].origin, SummaryOrigin::Fallback(FallbackReason::Parse));
        assert_eq!(out[1].record.headline, "title bad");
        assert!(out[1].record.tags.is_empty());
        assert_eq!(out[0].origin, SummaryOrigin::Generated);
        assert_eq!(out[2].record.headline, "見守りAI");
    }

    struct Chatty {
        calls: Arc<std::sync::atomic::AtomicUsize>,
    }

    impl crate::summarize::backend::Provider for Chatty {
        fn fetch<'a>(&'a self, _req: &'a SummaryRequest) -> crate::summarize::backend::BackendFuture<'a> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Box::pin(async { Ok("I could not summarize this article.".to_string()) })
        }
        fn name(&self) -> &'static str {
            "chatty"
        }
    }

    #[tokio::test]
    async fn unparseable_output_is_not_replayed_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let backend = crate::summarize::backend::CachingBackend::new(
            Chatty { calls: calls.clone() },
            dir.path().to_path_buf(),
            10,
        );
        let gen = SummaryGenerator::new(Arc::new(backend), Arc::new(crate::summarize::NoopExtractor));
        let c = Candidate::new("見守りAIの実証", "https://www.example.co.jp/n/1");

        for _ in 0..2 {
            let item = gen.summarize_one(&c, Region::Domestic).await;
            assert_eq!(item.origin, SummaryOrigin::Fallback(FallbackReason::Parse));
        }
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }
}
