// src/notify/line.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Transport;
use crate::digest::Message;

const DEFAULT_BASE_URL: &str = "https://api.line.me";
/// Messaging API limit per request.
const MAX_MESSAGES_PER_REQUEST: usize = 5;

#[derive(Clone)]
pub struct LineTransport {
    token: String,
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
struct PushBody<'a> {
    to: &'a str,
    messages: &'a [Message],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyBody<'a> {
    reply_token: &'a str,
    messages: &'a [Message],
}

#[derive(Serialize)]
struct BroadcastBody<'a> {
    messages: &'a [Message],
}

impl LineTransport {
    pub fn new(channel_access_token: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            token: channel_access_token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        }
    }

    /// Optional builder for tests/tools
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("line post {path}"))?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(anyhow!("line {path} status {status}: {detail}"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for LineTransport {
    /// One request per message, in order.
    async fn push(&self, to: &str, messages: &[Message]) -> Result<()> {
        for m in messages {
            self.post(
                "/v2/bot/message/push",
                &PushBody {
                    to,
                    messages: std::slice::from_ref(m),
                },
            )
            .await?;
        }
        tracing::info!(target: "notify", to, count = messages.len(), "pushed");
        Ok(())
    }

    async fn broadcast(&self, messages: &[Message]) -> Result<()> {
        for chunk in messages.chunks(MAX_MESSAGES_PER_REQUEST) {
            self.post("/v2/bot/message/broadcast", &BroadcastBody { messages: chunk })
                .await?;
        }
        tracing::info!(target: "notify", count = messages.len(), "broadcast sent");
        Ok(())
    }

    async fn reply(&self, reply_token: &str, messages: &[Message]) -> Result<()> {
        let n = messages.len().min(MAX_MESSAGES_PER_REQUEST);
        self.post(
            "/v2/bot/message/reply",
            &ReplyBody {
                reply_token,
                messages: &messages[..n],
            },
        )
        .await
    }

    fn name(&self) -> &'static str {
        "line"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_body_shape() {
        let msgs = vec![Message::text("hi")];
        let v = serde_json::to_value(PushBody {
            to: "C123",
            messages: &msgs,
        })
        .unwrap();
        assert_eq!(v["to"], "C123");
        assert_eq!(v["messages"][0]["type"], "text");
        let v = serde_json::to_value(ReplyBody {
            reply_token: "r",
            messages: &msgs,
        })
        .unwrap();
        assert_eq!(v["replyToken"], "r");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_error() {
        let t = LineTransport::new("token").with_base_url("http://127.0.0.1:9");
        assert!(t.push("C1", &[Message::text("x")]).await.is_err());
    }
}
