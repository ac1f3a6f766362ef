// src/registry.rs
//! Destination registry: chats the bot has seen, and which one receives the digest by
//! default. Updates are keyed by destination id and serialized by the store's lock.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    Group,
    Room,
    User,
    Unknown,
}

impl DestinationKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "group" => Self::Group,
            "room" => Self::Room,
            "user" => Self::User,
            _ => Self::Unknown,
        }
    }

    /// Multi-member chats; the first one seen becomes the default.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Group | Self::Room)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Destination {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: DestinationKind,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[async_trait::async_trait]
pub trait DestinationRegistry: Send + Sync {
    /// All rows, or only those of `kind`, in first-seen order.
    async fn list_destinations(&self, kind: Option<DestinationKind>) -> Result<Vec<Destination>>;
    /// The flagged default, else the first row.
    async fn get_default_destination(&self) -> Result<Option<String>>;
    /// Flag `id` as the only default, adding an `unknown` row if it was never seen.
    async fn set_default(&self, id: &str) -> Result<()>;
    /// Upsert `id`; promote it to default when it is a group/room and no default exists.
    async fn record_sighting(
        &self,
        id: &str,
        kind: DestinationKind,
        ts: DateTime<Utc>,
        display_name: Option<&str>,
    ) -> Result<()>;
}

/// Env override first, then the registry.
pub async fn resolve_default<R>(registry: &R, env_override: Option<&str>) -> Result<Option<String>>
where
    R: DestinationRegistry + ?Sized,
{
    let forced = env_override.unwrap_or_default().trim();
    if !forced.is_empty() {
        return Ok(Some(forced.to_string()));
    }
    registry.get_default_destination().await
}

// ------------------------------------------------------------
// Row operations shared by the stores
// ------------------------------------------------------------

fn apply_sighting(
    rows: &mut Vec<Destination>,
    id: &str,
    kind: DestinationKind,
    ts: DateTime<Utc>,
    display_name: Option<&str>,
) {
    let display_name = display_name.map(str::trim).filter(|s| !s.is_empty());
    match rows.iter_mut().find(|r| r.id == id) {
        Some(r) => {
            r.kind = kind;
            r.last_seen = ts;
            if let Some(n) = display_name {
                r.display_name = Some(n.to_string());
            }
        }
        None => rows.push(Destination {
            id: id.to_string(),
            kind,
            last_seen: ts,
            is_default: false,
            display_name: display_name.map(str::to_string),
        }),
    }
    if kind.is_shared() && !rows.iter().any(|r| r.is_default) {
        apply_set_default(rows, id, ts);
    }
}

fn apply_set_default(rows: &mut Vec<Destination>, id: &str, now: DateTime<Utc>) {
    for r in rows.iter_mut() {
        r.is_default = r.id == id;
    }
    if !rows.iter().any(|r| r.is_default) {
        rows.push(Destination {
            id: id.to_string(),
            kind: DestinationKind::Unknown,
            last_seen: now,
            is_default: true,
            display_name: None,
        });
    }
}

fn default_of(rows: &[Destination]) -> Option<String> {
    rows.iter()
        .find(|r| r.is_default)
        .or_else(|| rows.first())
        .map(|r| r.id.clone())
}

fn filter_kind(rows: &[Destination], kind: Option<DestinationKind>) -> Vec<Destination> {
    rows.iter()
        .filter(|r| kind.map_or(true, |k| r.kind == k))
        .cloned()
        .collect()
}

// ------------------------------------------------------------
// In-memory store
// ------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRegistry {
    rows: Mutex<Vec<Destination>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_rows<T>(&self, f: impl FnOnce(&mut Vec<Destination>) -> T) -> Result<T> {
        let mut g = self
            .rows
            .lock()
            .map_err(|_| anyhow::anyhow!("registry lock poisoned"))?;
        Ok(f(&mut g))
    }
}

#[async_trait::async_trait]
impl DestinationRegistry for MemoryRegistry {
    async fn list_destinations(&self, kind: Option<DestinationKind>) -> Result<Vec<Destination>> {
        self.with_rows(|rows| filter_kind(rows, kind))
    }

    async fn get_default_destination(&self) -> Result<Option<String>> {
        self.with_rows(|rows| default_of(rows))
    }

    async fn set_default(&self, id: &str) -> Result<()> {
        self.with_rows(|rows| apply_set_default(rows, id, Utc::now()))
    }

    async fn record_sighting(
        &self,
        id: &str,
        kind: DestinationKind,
        ts: DateTime<Utc>,
        display_name: Option<&str>,
    ) -> Result<()> {
        self.with_rows(|rows| apply_sighting(rows, id, kind, ts, display_name))
    }
}

// ------------------------------------------------------------
// JSON file store
// ------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    destinations: Vec<Destination>,
}

/// Whole-file read-modify-write under a process-local lock; writes go through a temp
/// file and a rename.
pub struct JsonFileRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Destination>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let s = fs::read_to_string(&self.path)
            .with_context(|| format!("reading registry {}", self.path.display()))?;
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        let file: StoreFile = serde_json::from_str(&s)
            .with_context(|| format!("parsing registry {}", self.path.display()))?;
        Ok(file.destinations)
    }

    fn save(&self, rows: Vec<Destination>) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating registry dir {}", dir.display()))?;
        }
        let json = serde_json::to_string_pretty(&StoreFile { destinations: rows })
            .context("serializing registry")?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes()).context("writing registry")?;
        fs::rename(&tmp, &self.path).context("renaming registry into place")?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&[Destination]) -> T) -> Result<T> {
        let _g = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("registry lock poisoned"))?;
        Ok(f(&self.load()?))
    }

    fn update(&self, f: impl FnOnce(&mut Vec<Destination>)) -> Result<()> {
        let _g = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("registry lock poisoned"))?;
        let mut rows = self.load()?;
        f(&mut rows);
        self.save(rows)
    }
}

#[async_trait::async_trait]
impl DestinationRegistry for JsonFileRegistry {
    async fn list_destinations(&self, kind: Option<DestinationKind>) -> Result<Vec<Destination>> {
        self.read(|rows| filter_kind(rows, kind))
    }

    async fn get_default_destination(&self) -> Result<Option<String>> {
        self.read(default_of)
    }

    async fn set_default(&self, id: &str) -> Result<()> {
        self.update(|rows| apply_set_default(rows, id, Utc::now()))
    }

    async fn record_sighting(
        &self,
        id: &str,
        kind: DestinationKind,
        ts: DateTime<Utc>,
        display_name: Option<&str>,
    ) -> Result<()> {
        let r = self.update(|rows| apply_sighting(rows, id, kind, ts, display_name));
        if r.is_ok() {
            tracing::debug!(target: "registry", id, kind = ?kind, "sighting recorded");
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 1, h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn first_group_becomes_default() {
        let r = MemoryRegistry::new();
        r.record_sighting("U1", DestinationKind::User, ts(1), None).await.unwrap();
        assert_eq!(r.get_default_destination().await.unwrap().as_deref(), Some("U1"));
        r.record_sighting("C1", DestinationKind::Group, ts(2), None).await.unwrap();
        r.record_sighting("C2", DestinationKind::Group, ts(3), None).await.unwrap();
        assert_eq!(r.get_default_destination().await.unwrap().as_deref(), Some("C1"));
        let groups = r.list_destinations(Some(DestinationKind::Group)).await.unwrap();
        assert_eq!(groups.len(), 2);
    }

    #[tokio::test]
    async fn set_default_unknown_id_adds_row() {
        let r = MemoryRegistry::new();
        r.record_sighting("C1", DestinationKind::Group, ts(1), Some("家族")).await.unwrap();
        r.set_default("Cx").await.unwrap();
        let all = r.list_destinations(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().filter(|d| d.is_default).all(|d| d.id == "Cx"));
        assert_eq!(all[0].display_name.as_deref(), Some("家族"));
    }

    #[tokio::test]
    async fn env_override_wins() {
        let r = MemoryRegistry::new();
        r.record_sighting("C1", DestinationKind::Group, ts(1), None).await.unwrap();
        assert_eq!(
            resolve_default(&r, Some("Cenv")).await.unwrap().as_deref(),
            Some("Cenv")
        );
        assert_eq!(resolve_default(&r, Some(" ")).await.unwrap().as_deref(), Some("C1"));
    }
}
