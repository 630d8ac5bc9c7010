//! Command queue lifecycle tests
//!
//! Enqueue always yields pending; status only ever moves forward;
//! expiry promotes stuck commands to failed without touching anything
//! terminal; write_rfid completion records the tag assignment in the
//! same transaction.

use std::collections::BTreeMap;
use tagsense_common::db::models::{Attribution, CommandStatus, PersonKind, WRITE_RFID};
use tagsense_common::{Error, Store};
use tagsense_engine::{commands, identity};

async fn test_store() -> Store {
    Store::open_in_memory().await.unwrap()
}

fn write_params(user_id: &str) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("user_id".to_string(), user_id.to_string());
    params
}

#[tokio::test]
async fn enqueue_yields_a_pending_command() {
    let store = test_store().await;

    let id = commands::enqueue(&store, WRITE_RFID, "person-1", &write_params("u1"), 1000)
        .await
        .unwrap();

    let command = commands::get(&store, WRITE_RFID, &id).await.unwrap();
    assert_eq!(command.status, CommandStatus::Pending);
    assert_eq!(command.target_id, "person-1");
    assert_eq!(command.created_at, 1000);
    assert_eq!(command.params.get("user_id").map(String::as_str), Some("u1"));
}

#[tokio::test]
async fn enqueue_accepts_unknown_targets() {
    let store = test_store().await;

    // no validation of target existence by design; the eventual
    // hardware failure is the only signal
    let id = commands::enqueue(&store, WRITE_RFID, "nobody", &BTreeMap::new(), 1000)
        .await
        .unwrap();
    assert_eq!(
        commands::get(&store, WRITE_RFID, &id).await.unwrap().status,
        CommandStatus::Pending
    );
}

#[tokio::test]
async fn enqueue_rejects_empty_identifiers() {
    let store = test_store().await;

    let err = commands::enqueue(&store, "", "person-1", &BTreeMap::new(), 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let err = commands::enqueue(&store, WRITE_RFID, "  ", &BTreeMap::new(), 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn claim_next_takes_the_oldest_pending_command() {
    let store = test_store().await;

    let first = commands::enqueue(&store, WRITE_RFID, "p1", &BTreeMap::new(), 1000)
        .await
        .unwrap();
    let second = commands::enqueue(&store, WRITE_RFID, "p2", &BTreeMap::new(), 1010)
        .await
        .unwrap();

    let claimed = commands::claim_next(&store, WRITE_RFID, 1020)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, first);
    assert_eq!(claimed.status, CommandStatus::InProgress);

    let claimed = commands::claim_next(&store, WRITE_RFID, 1021)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, second);

    // queue drained
    assert!(commands::claim_next(&store, WRITE_RFID, 1022)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn claim_next_ignores_other_kinds() {
    let store = test_store().await;

    commands::enqueue(&store, "reboot_reader", "reader-1", &BTreeMap::new(), 1000)
        .await
        .unwrap();

    assert!(commands::claim_next(&store, WRITE_RFID, 1010)
        .await
        .unwrap()
        .is_none());
    assert!(commands::claim_next(&store, "reboot_reader", 1010)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn status_never_moves_backward_or_skips_pickup() {
    let store = test_store().await;
    let id = commands::enqueue(&store, WRITE_RFID, "p1", &BTreeMap::new(), 1000)
        .await
        .unwrap();

    // completing a command nobody claimed skips in_progress
    let err = commands::complete(&store, WRITE_RFID, &id, 1010)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    commands::claim_next(&store, WRITE_RFID, 1020).await.unwrap();
    commands::complete(&store, WRITE_RFID, &id, 1030)
        .await
        .unwrap();

    // terminal states are final
    let err = commands::fail(&store, WRITE_RFID, &id, "too late", 1040)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let command = commands::get(&store, WRITE_RFID, &id).await.unwrap();
    assert_eq!(command.status, CommandStatus::Completed);
    assert_eq!(command.error, None);
}

#[tokio::test]
async fn failing_a_claimed_command_records_the_reason() {
    let store = test_store().await;
    let id = commands::enqueue(&store, WRITE_RFID, "p1", &BTreeMap::new(), 1000)
        .await
        .unwrap();
    commands::claim_next(&store, WRITE_RFID, 1010).await.unwrap();

    commands::fail(&store, WRITE_RFID, &id, "tag write verification failed", 1020)
        .await
        .unwrap();

    let command = commands::get(&store, WRITE_RFID, &id).await.unwrap();
    assert_eq!(command.status, CommandStatus::Failed);
    assert_eq!(
        command.error.as_deref(),
        Some("tag write verification failed")
    );
}

#[tokio::test]
async fn transitions_on_unknown_commands_are_not_found() {
    let store = test_store().await;
    let err = commands::complete(&store, WRITE_RFID, "ghost", 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn complete_write_rfid_assigns_the_tag_in_the_same_transaction() {
    let store = test_store().await;
    let person_id = identity::create_person(
        &store,
        PersonKind::Visitor,
        "Ada",
        "Wong",
        None,
        Some("AWong020530"),
        900,
    )
    .await
    .unwrap();

    let id = commands::enqueue(&store, WRITE_RFID, &person_id, &write_params("AWong020530"), 1000)
        .await
        .unwrap();
    commands::claim_next(&store, WRITE_RFID, 1010).await.unwrap();

    commands::complete_write_rfid(&store, &id, "TAG1", 1020)
        .await
        .unwrap();

    let command = commands::get(&store, WRITE_RFID, &id).await.unwrap();
    assert_eq!(command.status, CommandStatus::Completed);
    assert_eq!(
        identity::resolve_owner(&store, "TAG1").await.unwrap(),
        Attribution::Attributed(person_id.clone())
    );
    assert_eq!(
        identity::tags_of(&store, &person_id).await.unwrap(),
        vec!["TAG1".to_string()]
    );

    // a retried completion hits the status guard and changes nothing
    let err = commands::complete_write_rfid(&store, &id, "TAG1", 1030)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(
        identity::tags_of(&store, &person_id).await.unwrap(),
        vec!["TAG1".to_string()]
    );
}

#[tokio::test]
async fn expire_stale_promotes_only_over_threshold_commands() {
    let store = test_store().await;

    // defaults: pending 86400s, in_progress 3600s
    let old_pending = commands::enqueue(&store, WRITE_RFID, "p1", &BTreeMap::new(), 0)
        .await
        .unwrap();
    let fresh_pending = commands::enqueue(&store, WRITE_RFID, "p2", &BTreeMap::new(), 90_000)
        .await
        .unwrap();

    let expired = commands::expire_stale(&store, 100_000).await.unwrap();
    assert_eq!(expired, 1);

    let command = commands::get(&store, WRITE_RFID, &old_pending).await.unwrap();
    assert_eq!(command.status, CommandStatus::Failed);
    assert_eq!(command.error.as_deref(), Some("expired: never claimed"));
    assert_eq!(
        commands::get(&store, WRITE_RFID, &fresh_pending)
            .await
            .unwrap()
            .status,
        CommandStatus::Pending
    );

    // idempotent: terminal commands are never touched again
    assert_eq!(commands::expire_stale(&store, 200_000).await.unwrap(), 1); // fresh_pending ages out
    assert_eq!(commands::expire_stale(&store, 300_000).await.unwrap(), 0);
}

#[tokio::test]
async fn expire_stale_fails_abandoned_claims() {
    let store = test_store().await;

    let id = commands::enqueue(&store, WRITE_RFID, "p1", &BTreeMap::new(), 1000)
        .await
        .unwrap();
    commands::claim_next(&store, WRITE_RFID, 1010).await.unwrap();

    // within the in_progress window: untouched
    assert_eq!(commands::expire_stale(&store, 4_000).await.unwrap(), 0);

    // agent went silent past the window
    assert_eq!(commands::expire_stale(&store, 5_000).await.unwrap(), 1);
    let command = commands::get(&store, WRITE_RFID, &id).await.unwrap();
    assert_eq!(command.status, CommandStatus::Failed);
    assert_eq!(
        command.error.as_deref(),
        Some("expired: agent never completed")
    );
}

#[tokio::test]
async fn pending_lists_only_waiting_commands_oldest_first() {
    let store = test_store().await;

    let a = commands::enqueue(&store, WRITE_RFID, "p1", &BTreeMap::new(), 1000)
        .await
        .unwrap();
    let b = commands::enqueue(&store, WRITE_RFID, "p2", &BTreeMap::new(), 1010)
        .await
        .unwrap();
    commands::enqueue(&store, "reboot_reader", "r1", &BTreeMap::new(), 1005)
        .await
        .unwrap();

    let waiting = commands::pending(&store, WRITE_RFID).await.unwrap();
    assert_eq!(
        waiting.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
        vec![a.as_str(), b.as_str()]
    );

    commands::claim_next(&store, WRITE_RFID, 1020).await.unwrap();
    let waiting = commands::pending(&store, WRITE_RFID).await.unwrap();
    assert_eq!(waiting.len(), 1);
    assert_eq!(waiting[0].id, b);
}
