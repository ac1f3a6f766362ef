// tests/registry_store.rs
//
// JSON-file destination registry: persistence, default promotion, concurrent sightings.

use std::sync::Arc;

use chrono::{TimeZone, Utc};

use eldercare_digest::notify::{plan_delivery, DeliveryPlan};
use eldercare_digest::registry::{DestinationKind, DestinationRegistry, JsonFileRegistry};

#[tokio::test]
async fn sightings_survive_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested/dir/destinations.json");
    let ts = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();

    {
        let r = JsonFileRegistry::new(&path);
        assert!(r.list_destinations(None).await.unwrap().is_empty());
        assert_eq!(r.get_default_destination().await.unwrap(), None);

        r.record_sighting("U1", DestinationKind::User, ts, None).await.unwrap();
        r.record_sighting("R1", DestinationKind::Room, ts, Some("会議室")).await.unwrap();
        r.record_sighting("C1", DestinationKind::Group, ts, None).await.unwrap();
    }

    let r = JsonFileRegistry::new(&path);
    let all = r.list_destinations(None).await.unwrap();
    assert_eq!(
        all.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
        vec!["U1", "R1", "C1"]
    );
    // first shared chat seen becomes the default
    assert_eq!(r.get_default_destination().await.unwrap().as_deref(), Some("R1"));
    assert_eq!(all[1].display_name.as_deref(), Some("会議室"));

    let raw = std::fs::read_to_string(&path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["destinations"][1]["type"], "room");
    assert_eq!(v["destinations"][1]["isDefault"], true);
    assert!(v["destinations"][0]["lastSeen"].is_string());
}

#[tokio::test]
async fn set_default_moves_the_flag() {
    let tmp = tempfile::tempdir().unwrap();
    let r = JsonFileRegistry::new(tmp.path().join("d.json"));
    let ts = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
    r.record_sighting("C1", DestinationKind::Group, ts, None).await.unwrap();
    r.record_sighting("C2", DestinationKind::Group, ts, None).await.unwrap();

    r.set_default("C2").await.unwrap();
    let all = r.list_destinations(None).await.unwrap();
    assert_eq!(all.iter().filter(|d| d.is_default).count(), 1);
    assert_eq!(r.get_default_destination().await.unwrap().as_deref(), Some("C2"));

    assert_eq!(
        plan_delivery(Some("all-groups"), &r, None).await.unwrap(),
        DeliveryPlan::AllGroups(vec!["C1".into(), "C2".into()])
    );
}

#[tokio::test]
async fn concurrent_sightings_are_all_kept() {
    let tmp = tempfile::tempdir().unwrap();
    let r = Arc::new(JsonFileRegistry::new(tmp.path().join("d.json")));

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let r = r.clone();
            tokio::spawn(async move {
                r.record_sighting(&format!("C{i}"), DestinationKind::Group, Utc::now(), None)
                    .await
            })
        })
        .collect();
    for t in tasks {
        t.await.unwrap().unwrap();
    }

    let groups = r.list_destinations(Some(DestinationKind::Group)).await.unwrap();
    assert_eq!(groups.len(), 16);
    assert_eq!(groups.iter().filter(|d| d.is_default).count(), 1);
}

#[tokio::test]
async fn unreadable_store_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("d.json");
    std::fs::write(&path, "{ not json").unwrap();
    let r = JsonFileRegistry::new(&path);
    assert!(r.list_destinations(None).await.is_err());
}
