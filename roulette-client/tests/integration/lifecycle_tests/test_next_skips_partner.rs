use roulette_client::store::RendezvousStore;
use roulette_client::{MatchState, MemoryStore};

use crate::integration::{connected_pair, init_tracing};
use crate::utils::{STATE_TIMEOUT_MS, TestPeer, wait_until};

#[tokio::test]
async fn test_next_closes_room_and_matches_again() {
    init_tracing();
    let store = MemoryStore::new();
    let (caller, callee, room_id) = connected_pair(&store).await.unwrap();

    callee.session.next().await.unwrap();

    assert_eq!(store.get(&format!("rooms/{room_id}")).await.unwrap(), None);
    assert_ne!(callee.session.room_id().await, Some(room_id.clone()));
    assert_eq!(callee.negotiators.created_count().await, 2);
    assert!(callee.negotiators.created().await[0].is_closed().await);
    assert_eq!(callee.devices.issued().await.len(), 2, "media is re-acquired");

    // The abandoned caller re-matches on its own.
    let moved_on = wait_until(STATE_TIMEOUT_MS, || {
        let caller = &caller;
        let room_id = room_id.clone();
        async move {
            let state = caller.session.match_state().await;
            let room = caller.session.room_id().await;
            room.is_some_and(|room| room != room_id)
                && matches!(state, MatchState::CallerWaiting | MatchState::Connected)
        }
    })
    .await;
    assert!(moved_on);
}

#[tokio::test]
async fn test_failed_next_leaves_next_enabled() {
    init_tracing();
    let store = MemoryStore::new();
    let peer = TestPeer::new(&store);

    assert!(peer.session.next().await.is_err());

    let events = &peer.events;
    assert!(
        wait_until(STATE_TIMEOUT_MS, || async move {
            events.last_next_enabled().await == Some(true)
        })
        .await
    );
    assert_eq!(peer.session.match_state().await, MatchState::Idle);
}
