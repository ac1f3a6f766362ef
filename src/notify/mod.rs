// src/notify/mod.rs
//! Delivery of digest messages. Fire-and-forget from the pipeline's point of view:
//! transports report errors, callers decide whether to surface them.

pub mod line;
pub mod plan;

pub use line::LineTransport;
pub use plan::{deliver, plan_delivery, DeliveryPlan, ALL_GROUPS, TARGET_PAUSE};

use anyhow::Result;
use std::sync::Mutex;

use crate::digest::Message;

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send `messages` to one destination, in order.
    async fn push(&self, to: &str, messages: &[Message]) -> Result<()>;
    /// Send `messages` to every follower of the bot.
    async fn broadcast(&self, messages: &[Message]) -> Result<()>;
    /// Answer a webhook event.
    async fn reply(&self, reply_token: &str, messages: &[Message]) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// What a [`LogTransport`] was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Push { to: String, messages: Vec<Message> },
    Broadcast { messages: Vec<Message> },
    Reply { token: String, messages: Vec<Message> },
}

/// Logs and records instead of sending. Dry runs and tests.
#[derive(Default)]
pub struct LogTransport {
    sent: Mutex<Vec<Delivery>>,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Delivery> {
        self.sent.lock().map(|g| g.clone()).unwrap_or_default()
    }

    fn record(&self, d: Delivery) {
        if let Ok(mut g) = self.sent.lock() {
            g.push(d);
        }
    }
}

#[async_trait::async_trait]
impl Transport for LogTransport {
    async fn push(&self, to: &str, messages: &[Message]) -> Result<()> {
        tracing::info!(target: "notify", to, count = messages.len(), "push (log only)");
        self.record(Delivery::Push {
            to: to.to_string(),
            messages: messages.to_vec(),
        });
        Ok(())
    }

    async fn broadcast(&self, messages: &[Message]) -> Result<()> {
        tracing::info!(target: "notify", count = messages.len(), "broadcast (log only)");
        self.record(Delivery::Broadcast {
            messages: messages.to_vec(),
        });
        Ok(())
    }

    async fn reply(&self, reply_token: &str, messages: &[Message]) -> Result<()> {
        tracing::debug!(target: "notify", count = messages.len(), "reply (log only)");
        self.record(Delivery::Reply {
            token: reply_token.to_string(),
            messages: messages.to_vec(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
