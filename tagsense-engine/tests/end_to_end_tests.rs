//! End-to-end scenario: visitor onboarding through presence eviction
//!
//! Registration enqueues a write command; the hardware agent claims and
//! completes it, creating the tag; a reader reports the tag in the
//! kitchen; the visitor shows up in the derived view; five minutes of
//! silence later the sweep evicts them.

use std::collections::BTreeMap;
use tagsense_common::db::models::{CommandStatus, PersonKind, Trend, WRITE_RFID};
use tagsense_common::Store;
use tagsense_engine::{commands, identity, ingest, presence, reaper};

#[tokio::test]
async fn visitor_registration_to_eviction() {
    let store = Store::open_in_memory().await.unwrap();

    // registration flow: create the visitor and enqueue the write
    let person_id = identity::create_person(
        &store,
        PersonKind::Visitor,
        "Ada",
        "Wong",
        Some("1990-02-05"),
        Some("AWong020530"),
        800,
    )
    .await
    .unwrap();

    let mut params = BTreeMap::new();
    params.insert("user_id".to_string(), "AWong020530".to_string());
    let command_id = commands::enqueue(&store, WRITE_RFID, &person_id, &params, 810)
        .await
        .unwrap();
    assert_eq!(
        commands::get(&store, WRITE_RFID, &command_id)
            .await
            .unwrap()
            .status,
        CommandStatus::Pending
    );

    // hardware agent: poll, claim, encode, acknowledge
    let claimed = commands::claim_next(&store, WRITE_RFID, 900)
        .await
        .unwrap()
        .expect("a pending command to claim");
    assert_eq!(claimed.id, command_id);
    commands::complete_write_rfid(&store, &command_id, "TAG-T", 910)
        .await
        .unwrap();

    // reader: one scan event in the kitchen at t=1000
    ingest::record_reading(&store, "TAG-T", "kitchen", 40, 1000)
        .await
        .unwrap();

    let view = presence::people_by_location(&store).await.unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view.get("kitchen").unwrap(), &vec![person_id.clone()]);

    let summary = presence::visitor_summary(&store).await.unwrap();
    assert_eq!(summary.count, 1);
    assert_eq!(summary.trend, Trend::Up); // baseline snapshot is still 0
    assert_eq!(summary.rooms.get("kitchen"), Some(&1));

    // silence past the liveness window: the sweep evicts
    reaper::sweep(&store, 1301).await.unwrap();

    let view = presence::people_by_location(&store).await.unwrap();
    assert!(view.is_empty());

    let summary = presence::visitor_summary(&store).await.unwrap();
    assert_eq!(summary.count, 0);
    assert_eq!(summary.trend, Trend::Steady); // sweep re-baselined to 0

    // the audit trail survives eviction
    let person = identity::get_person(&store, &person_id).await.unwrap();
    assert_eq!(person.current_location, None);
    assert_eq!(person.last_seen, Some(1301));

    let history: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM location_history WHERE person_id = ?")
            .bind(&person_id)
            .fetch_one(store.pool())
            .await
            .unwrap();
    assert_eq!(history, 1);

    let readings: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag_readings")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(readings, 1);
}

#[tokio::test]
async fn completed_command_without_tag_is_tolerated_downstream() {
    let store = Store::open_in_memory().await.unwrap();

    let person_id = identity::create_person(
        &store,
        PersonKind::Visitor,
        "Leon",
        "Kennedy",
        None,
        None,
        800,
    )
    .await
    .unwrap();

    // a legacy agent acknowledges via the plain completion path and
    // never creates the tag record
    let command_id = commands::enqueue(&store, WRITE_RFID, &person_id, &BTreeMap::new(), 810)
        .await
        .unwrap();
    commands::claim_next(&store, WRITE_RFID, 900).await.unwrap();
    commands::complete(&store, WRITE_RFID, &command_id, 910)
        .await
        .unwrap();

    // the inconsistency is visible, not fatal: completed command, no
    // assigned tag, and every read path still answers
    assert_eq!(
        commands::get(&store, WRITE_RFID, &command_id)
            .await
            .unwrap()
            .status,
        CommandStatus::Completed
    );
    assert!(identity::tags_of(&store, &person_id).await.unwrap().is_empty());
    assert!(presence::people_by_location(&store).await.unwrap().is_empty());
    assert_eq!(presence::visitor_summary(&store).await.unwrap().count, 0);
}

#[tokio::test]
async fn reassigned_tag_attributes_to_the_new_owner_only() {
    let store = Store::open_in_memory().await.unwrap();

    let first = identity::create_person(
        &store,
        PersonKind::Visitor,
        "Ada",
        "Wong",
        None,
        None,
        800,
    )
    .await
    .unwrap();
    let second = identity::create_person(
        &store,
        PersonKind::Visitor,
        "Leon",
        "Kennedy",
        None,
        None,
        800,
    )
    .await
    .unwrap();

    identity::assign_tag(&store, "TAG-T", &first, 850).await.unwrap();
    ingest::record_reading(&store, "TAG-T", "kitchen", 40, 900)
        .await
        .unwrap();

    // tag handed to someone else mid-visit
    identity::assign_tag(&store, "TAG-T", &second, 950).await.unwrap();
    ingest::record_reading(&store, "TAG-T", "studio", 40, 1000)
        .await
        .unwrap();

    let view = presence::people_by_location(&store).await.unwrap();
    assert_eq!(view.get("kitchen").unwrap(), &vec![first.clone()]);
    assert_eq!(view.get("studio").unwrap(), &vec![second.clone()]);

    // the first person's stale kitchen presence ages out normally
    reaper::sweep(&store, 1201).await.unwrap();
    let view = presence::people_by_location(&store).await.unwrap();
    assert_eq!(view.get("kitchen"), None);
    assert_eq!(view.get("studio").unwrap(), &vec![second]);
}
