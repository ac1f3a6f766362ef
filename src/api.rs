use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shuttle_axum::axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::curation::RegionBucket;
use crate::digest::Message;
use crate::engine::DigestEngine;
use crate::notify::{deliver, plan_delivery, DeliveryPlan, Transport, TARGET_PAUSE};
use crate::registry::{resolve_default, DestinationKind, DestinationRegistry};

const SAMPLE_DEFAULT: usize = 5;
const SAMPLE_MAX: usize = 20;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DigestEngine>,
    pub transport: Arc<dyn Transport>,
    pub registry: Arc<dyn DestinationRegistry>,
    /// `DEFAULT_TO` / `TEST_GROUP_ID`; beats the registry default.
    pub default_override: Option<String>,
    pub target_pause: Duration,
}

impl AppState {
    pub fn new(
        engine: Arc<DigestEngine>,
        transport: Arc<dyn Transport>,
        registry: Arc<dyn DestinationRegistry>,
        default_override: Option<String>,
    ) -> Self {
        Self {
            engine,
            transport,
            registry,
            default_override,
            target_pause: TARGET_PAUSE,
        }
    }

    pub fn with_target_pause(mut self, pause: Duration) -> Self {
        self.target_pause = pause;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/broadcast-weekly", get(broadcast_weekly))
        .route("/debug/collect", get(debug_collect))
        .route("/webhook", post(webhook))
        .route("/groups", get(list_groups))
        .route("/groups/default", post(set_default_group))
        .route("/groups/test", get(test_default_group))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

fn fail(status: StatusCode, error: impl std::fmt::Display) -> Response {
    (status, Json(json!({ "ok": false, "error": error.to_string() }))).into_response()
}

// ------------------------------------------------------------
// /broadcast-weekly
// ------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastResp {
    ok: bool,
    mode: &'static str,
    sent: bool,
    targets_count: usize,
    domestic: usize,
    overseas: usize,
}

async fn broadcast_weekly(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let send = q.get("send").map_or(true, |v| v == "1");
    let to: Option<String> = q.get("to").cloned();
    let registry = state.registry.clone();
    let transport = state.transport.clone();

    let planned = plan_delivery(to.as_deref(), registry.as_ref(), state.default_override.as_deref()).await;
    let plan = match planned {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(target: "api", error = ?e, "destination lookup failed");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, e);
        }
    };
    if plan == DeliveryPlan::AllGroups(Vec::new()) {
        return fail(StatusCode::BAD_REQUEST, "no saved groups");
    }

    let run = state.engine.build_digest().await;

    if send {
        let delivered = deliver(transport.as_ref(), &plan, &run.messages, state.target_pause).await;
        if let Err(e) = delivered {
            tracing::warn!(target: "api", error = ?e, mode = plan.mode(), "delivery failed");
            return fail(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"));
        }
    }

    tracing::info!(
        target: "api",
        mode = plan.mode(),
        sent = send,
        domestic = run.domestic.len(),
        overseas = run.overseas.len(),
        "weekly digest handled"
    );
    Json(BroadcastResp {
        ok: true,
        mode: plan.mode(),
        sent: send,
        targets_count: plan.targets().len(),
        domestic: run.domestic.len(),
        overseas: run.overseas.len(),
    })
    .into_response()
}

// ------------------------------------------------------------
// /debug/collect
// ------------------------------------------------------------

#[derive(Serialize)]
struct Sample {
    title: String,
    source: String,
    link: String,
}

#[derive(Serialize)]
struct CollectResp {
    ok: bool,
    since_iso: String,
    domestic_count: usize,
    overseas_count: usize,
    domestic_samples: Vec<Sample>,
    overseas_samples: Vec<Sample>,
}

fn samples(bucket: &RegionBucket, n: usize) -> Vec<Sample> {
    bucket
        .items
        .iter()
        .take(n)
        .map(|a| Sample {
            title: a.item.candidate.title.clone(),
            source: a.item.candidate.source_name.clone(),
            link: a.item.candidate.link.clone(),
        })
        .collect()
}

async fn debug_collect(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Json<CollectResp> {
    let n = q
        .get("n")
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(SAMPLE_DEFAULT)
        .clamp(1, SAMPLE_MAX);

    let now = Utc::now();
    let since = now - chrono::Duration::days(state.engine.curator().config().window_days);
    let collected = state.engine.collect_at(now).await;
    let out = &collected.outcome;

    Json(CollectResp {
        ok: true,
        since_iso: since.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        domestic_count: out.domestic.len(),
        overseas_count: out.overseas.len(),
        domestic_samples: samples(&out.domestic, n),
        overseas_samples: samples(&out.overseas, n),
    })
}

// ------------------------------------------------------------
// /webhook
// ------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<WebhookEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct WebhookEvent {
    #[serde(rename = "type")]
    kind: String,
    reply_token: Option<String>,
    /// Epoch milliseconds.
    timestamp: Option<i64>,
    source: Option<EventSource>,
    message: Option<EventMessage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EventSource {
    #[serde(rename = "type")]
    kind: String,
    group_id: Option<String>,
    room_id: Option<String>,
    user_id: Option<String>,
}

impl EventSource {
    /// The chat the event happened in: group, then room, then user.
    fn destination(&self) -> Option<(&str, DestinationKind)> {
        if let Some(id) = self.group_id.as_deref() {
            return Some((id, DestinationKind::Group));
        }
        if let Some(id) = self.room_id.as_deref() {
            return Some((id, DestinationKind::Room));
        }
        self.user_id
            .as_deref()
            .map(|id| (id, DestinationKind::parse(&self.kind)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventMessage {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

fn event_time(ms: Option<i64>) -> DateTime<Utc> {
    ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

pub fn echo_text(text: &str) -> String {
    format!("受け取りました: 「{text}」")
}

async fn webhook(State(state): State<AppState>, Json(body): Json<Value>) -> &'static str {
    let body: WebhookBody = serde_json::from_value(body).unwrap_or_default();
    for ev in body.events {
        let sighting: Option<(String, DestinationKind)> = ev
            .source
            .as_ref()
            .and_then(|s| s.destination())
            .map(|(id, kind)| (id.to_string(), kind));
        if let Some((id, kind)) = sighting {
            let ts = event_time(ev.timestamp);
            let recorded = state.registry.record_sighting(&id, kind, ts, None).await;
            if let Err(e) = recorded {
                tracing::warn!(target: "api", error = ?e, id = %id, "could not record sighting");
            }
        }

        let echo: Option<(String, String)> = match (&ev.message, &ev.reply_token) {
            (Some(m), Some(token)) if ev.kind == "message" && m.kind == "text" => {
                m.text.as_ref().map(|t| (token.clone(), echo_text(t)))
            }
            _ => None,
        };
        if let Some((token, text)) = echo {
            let replied = state.transport.reply(&token, &[Message::text(text)]).await;
            if let Err(e) = replied {
                tracing::warn!(target: "api", error = ?e, "reply failed");
            }
        }
    }
    "ok"
}

// ------------------------------------------------------------
// /groups
// ------------------------------------------------------------

async fn list_groups(State(state): State<AppState>) -> Response {
    let listed = state
        .registry
        .list_destinations(Some(DestinationKind::Group))
        .await;
    let groups = match listed {
        Ok(rows) => rows.into_iter().map(|d| d.id).collect::<Vec<_>>(),
        Err(e) => return fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    let registry = state.registry.clone();
    let resolved = resolve_default(registry.as_ref(), state.default_override.as_deref()).await;
    match resolved {
        Ok(def) => Json(json!({ "ok": true, "defaultTo": def, "groups": groups })).into_response(),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn set_default_group(
    State(state): State<AppState>,
    Query(q): Query<HashMap<String, String>>,
) -> Response {
    let to = q.get("to").map(|s| s.trim().to_string()).unwrap_or_default();
    if to.is_empty() {
        return fail(StatusCode::BAD_REQUEST, "to is required");
    }
    let updated = state.registry.set_default(&to).await;
    match updated {
        Ok(()) => Json(json!({ "ok": true, "defaultTo": to })).into_response(),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn test_default_group(State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    let resolved = resolve_default(registry.as_ref(), state.default_override.as_deref()).await;
    let to = match resolved {
        Ok(Some(to)) => to,
        Ok(None) => return fail(StatusCode::BAD_REQUEST, "no default destination"),
        Err(e) => return fail(StatusCode::INTERNAL_SERVER_ERROR, e),
    };
    let msg = [Message::text("✅ 既定宛先へのテスト送信です")];
    let pushed = state.transport.push(&to, &msg).await;
    match pushed {
        Ok(()) => Json(json!({ "ok": true, "to": to })).into_response(),
        Err(e) => fail(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")),
    }
}
