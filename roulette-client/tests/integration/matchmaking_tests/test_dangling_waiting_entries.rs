use roulette_client::store::RendezvousStore;
use std::sync::Arc;

use roulette_client::{MemoryStore, Role, SessionError};
use roulette_core::utils::now_millis;
use serde_json::json;

use crate::integration::init_tracing;
use crate::utils::{FlakyStore, TestPeer, child_count, rooms};

#[tokio::test]
async fn test_waiting_entry_without_room_is_removed() {
    init_tracing();
    let store = MemoryStore::new();
    let peer = TestPeer::authenticated(&store, "101").await.unwrap();

    store
        .set(
            "waiting_rooms/ghost",
            json!({"creatorId": "ghost", "status": "waiting", "createdAt": now_millis()}),
        )
        .await
        .unwrap();

    peer.session.start().await.unwrap();

    assert_eq!(store.get("waiting_rooms/ghost").await.unwrap(), None);
    assert_eq!(peer.session.role().await, Some(Role::Caller));
    assert_eq!(child_count(&store, "waiting_rooms").await, 1);
    assert_eq!(peer.negotiators.created_count().await, 2, "one negotiation object per try");
}

#[tokio::test]
async fn test_room_without_offer_is_skipped() {
    init_tracing();
    let store = MemoryStore::new();
    let peer = TestPeer::authenticated(&store, "101").await.unwrap();

    let now = now_millis();
    store
        .set("rooms/bare", json!({"creatorId": "other", "status": "waiting", "createdAt": now}))
        .await
        .unwrap();
    store
        .set("waiting_rooms/bare", json!({"creatorId": "other", "status": "waiting", "createdAt": now}))
        .await
        .unwrap();

    peer.session.start().await.unwrap();

    assert_eq!(store.get("waiting_rooms/bare").await.unwrap(), None);
    assert_eq!(peer.session.role().await, Some(Role::Caller));
    assert_ne!(peer.session.room_id().await.map(|id| id.0), Some("bare".to_owned()));
}

#[tokio::test]
async fn test_waiting_entry_of_full_room_is_removed() {
    init_tracing();
    let store = MemoryStore::new();
    let peer = TestPeer::authenticated(&store, "101").await.unwrap();

    let now = now_millis();
    store
        .set(
            "rooms/taken",
            json!({
                "creatorId": "c",
                "status": "full",
                "createdAt": now,
                "offer": {"type": "offer", "sdp": "v=0"},
                "joinerId": "j",
            }),
        )
        .await
        .unwrap();
    store
        .set("waiting_rooms/taken", json!({"creatorId": "c", "status": "waiting", "createdAt": now}))
        .await
        .unwrap();

    peer.session.start().await.unwrap();

    assert_eq!(store.get("waiting_rooms/taken").await.unwrap(), None);
    let taken = rooms(&store)
        .await
        .into_iter()
        .find(|(key, _)| key == "taken")
        .map(|(_, room)| room);
    assert_eq!(taken.and_then(|room| room.joiner_id).map(|id| id.0), Some("j".to_owned()));
}

#[tokio::test]
async fn test_many_dangling_entries_never_reach_the_user() {
    init_tracing();
    let store = MemoryStore::new();
    let peer = TestPeer::authenticated(&store, "101").await.unwrap();

    // More dangling entries than the lost-claim allowance.
    for n in 0..5 {
        store
            .set(
                &format!("waiting_rooms/ghost{n}"),
                json!({"creatorId": format!("ghost{n}"), "status": "waiting", "createdAt": now_millis()}),
            )
            .await
            .unwrap();
    }

    peer.session.start().await.unwrap();

    assert_eq!(peer.session.role().await, Some(Role::Caller));
    assert_eq!(peer.negotiators.created_count().await, 6);
    assert_eq!(child_count(&store, "waiting_rooms").await, 1);
    assert_eq!(rooms(&store).await.len(), 1);
    assert!(peer.events.errors().await.is_empty());
}

#[tokio::test]
async fn test_failed_cleanup_of_dangling_entry_ends_the_attempt() {
    init_tracing();
    let store = MemoryStore::new();
    store
        .set(
            "waiting_rooms/stuck",
            json!({"creatorId": "gone", "status": "waiting", "createdAt": now_millis()}),
        )
        .await
        .unwrap();
    let flaky = Arc::new(FlakyStore::new(store.connect()));
    flaky.fail_removal_of("waiting_rooms/stuck").await;
    let peer = TestPeer::with_store(&store, flaky);
    peer.authenticate("101").await.unwrap();

    let result = peer.session.start().await;

    assert!(matches!(result, Err(SessionError::StoreUnavailable(_))));
    assert_eq!(peer.negotiators.created_count().await, 1);
    assert!(store.get("waiting_rooms/stuck").await.unwrap().is_some());
    assert!(rooms(&store).await.is_empty());
}
