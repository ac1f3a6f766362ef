// src/notify/plan.rs
//! Who receives a digest run, and the send loop.

use anyhow::Result;
use std::time::Duration;

use super::Transport;
use crate::digest::Message;
use crate::registry::{resolve_default, DestinationKind, DestinationRegistry};

/// `to=all-groups` selects every known group.
pub const ALL_GROUPS: &str = "all-groups";
/// Pause between destinations.
pub const TARGET_PAUSE: Duration = Duration::from_millis(150);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryPlan {
    AllGroups(Vec<String>),
    Single(String),
    Default(String),
    Broadcast,
}

impl DeliveryPlan {
    pub fn mode(&self) -> &'static str {
        match self {
            DeliveryPlan::AllGroups(_) => "push:all-groups",
            DeliveryPlan::Single(_) => "push:single",
            DeliveryPlan::Default(_) => "push:default",
            DeliveryPlan::Broadcast => "broadcast",
        }
    }

    pub fn targets(&self) -> Vec<String> {
        match self {
            DeliveryPlan::AllGroups(ids) => ids.clone(),
            DeliveryPlan::Single(id) | DeliveryPlan::Default(id) => vec![id.clone()],
            DeliveryPlan::Broadcast => Vec::new(),
        }
    }
}

/// `to` = `all-groups` | explicit id | absent (registry default, else broadcast).
pub async fn plan_delivery<R>(
    to: Option<&str>,
    registry: &R,
    default_override: Option<&str>,
) -> Result<DeliveryPlan>
where
    R: DestinationRegistry + ?Sized,
{
    let to = to.unwrap_or_default().trim();
    if to == ALL_GROUPS {
        let rows = registry
            .list_destinations(Some(DestinationKind::Group))
            .await?;
        return Ok(DeliveryPlan::AllGroups(rows.into_iter().map(|d| d.id).collect()));
    }
    if !to.is_empty() {
        return Ok(DeliveryPlan::Single(to.to_string()));
    }
    let default = resolve_default(registry, default_override).await?;
    Ok(match default {
        Some(id) => DeliveryPlan::Default(id),
        None => DeliveryPlan::Broadcast,
    })
}

/// Push every message to each target in turn, pausing between targets.
pub async fn deliver<T>(
    transport: &T,
    plan: &DeliveryPlan,
    messages: &[Message],
    pause: Duration,
) -> Result<()>
where
    T: Transport + ?Sized,
{
    if *plan == DeliveryPlan::Broadcast {
        return transport.broadcast(messages).await;
    }
    for to in plan.targets() {
        transport.push(&to, messages).await?;
        tokio::time::sleep(pause).await;
    }
    Ok(())
}
