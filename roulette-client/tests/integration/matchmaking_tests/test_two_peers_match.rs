use std::sync::Arc;

use async_trait::async_trait;
use roulette_client::stats::{PeerStatsSource, StatsError};
use roulette_client::store::RendezvousStore;
use roulette_client::{MatchState, MemoryStore, Role, SessionEvent};
use roulette_core::{DurableUserId, PeerStats, RoomStatus};
use tokio::sync::Mutex;

use crate::integration::{connected_pair, init_tracing};
use crate::utils::{STATE_TIMEOUT_MS, TestPeer, child_count, rooms, wait_until};

#[tokio::test]
async fn test_two_fresh_peers_end_in_one_full_room() {
    init_tracing();
    let store = MemoryStore::new();

    let x = TestPeer::authenticated(&store, "101").await.unwrap();
    let y = TestPeer::authenticated(&store, "202").await.unwrap();

    x.session.start().await.unwrap();
    assert_eq!(x.session.role().await, Some(Role::Caller));
    assert_eq!(x.session.match_state().await, MatchState::CallerWaiting);

    // X published the room with the offer embedded plus its waiting entry.
    let published = rooms(&store).await;
    assert_eq!(published.len(), 1);
    let (room_key, room) = &published[0];
    assert_eq!(room.status, RoomStatus::Waiting);
    assert_eq!(room.creator_id, x.peer_id().await);
    assert!(room.usable_offer().is_some());
    assert!(store.get(&format!("waiting_rooms/{room_key}")).await.unwrap().is_some());

    y.session.start().await.unwrap();
    assert_eq!(y.session.role().await, Some(Role::Callee));
    assert!(x.wait_for_state(MatchState::Connected).await);
    assert_eq!(y.session.match_state().await, MatchState::Connected);

    let settled = rooms(&store).await;
    assert_eq!(settled.len(), 1, "exactly one room");
    let (_, room) = &settled[0];
    assert_eq!(room.status, RoomStatus::Full);
    assert_eq!(room.joiner_id.as_ref(), Some(&y.peer_id().await));
    assert_eq!(room.joiner_durable_id, Some(DurableUserId::from("202")));
    assert!(room.offer.is_some());
    assert!(room.answer.is_some());
    assert_eq!(child_count(&store, "waiting_rooms").await, 0);

    // X applied Y's answer, Y applied X's offer.
    let x_negotiator = x.negotiators.last().await.unwrap();
    let y_negotiator = y.negotiators.last().await.unwrap();
    assert_eq!(x_negotiator.remote_description().await, room.answer);
    assert_eq!(y_negotiator.remote_description().await, room.offer);
    assert_eq!(x_negotiator.tracks_added().await, 2);
}

#[tokio::test]
async fn test_candidates_cross_over() {
    init_tracing();
    let store = MemoryStore::new();
    let (x, y, _room_id) = connected_pair(&store).await.unwrap();

    let x_negotiator = x.negotiators.last().await.unwrap();
    let y_negotiator = y.negotiators.last().await.unwrap();

    let crossed = wait_until(STATE_TIMEOUT_MS, || {
        let (x_negotiator, y_negotiator) = (x_negotiator.clone(), y_negotiator.clone());
        async move {
            !x_negotiator.remote_candidates().await.is_empty()
                && !y_negotiator.remote_candidates().await.is_empty()
        }
    })
    .await;
    assert!(crossed, "both sides should receive the other's candidate");

    let x_got = x_negotiator.remote_candidates().await;
    let y_got = y_negotiator.remote_candidates().await;
    assert!(x_got[0].candidate.contains(&format!("mock-{}", y_negotiator.id)));
    assert!(y_got[0].candidate.contains(&format!("mock-{}", x_negotiator.id)));
}

struct FixedStats {
    requested: Mutex<Vec<DurableUserId>>,
}

#[async_trait]
impl PeerStatsSource for FixedStats {
    async fn fetch(&self, durable_id: &DurableUserId) -> Result<PeerStats, StatsError> {
        self.requested.lock().await.push(durable_id.clone());
        Ok(PeerStats {
            success: true,
            is_new_user: false,
            aura_points: 12,
            avg_rating: 4.5,
            total_ratings: 3,
            error: None,
        })
    }
}

#[tokio::test]
async fn test_each_side_loads_the_other_peers_stats() {
    init_tracing();
    let store = MemoryStore::new();
    let x_stats = Arc::new(FixedStats {
        requested: Mutex::new(Vec::new()),
    });
    let y_stats = Arc::new(FixedStats {
        requested: Mutex::new(Vec::new()),
    });

    let x = TestPeer::with_peer_stats(&store, x_stats.clone());
    x.authenticate("101").await.unwrap();
    let y = TestPeer::with_peer_stats(&store, y_stats.clone());
    y.authenticate("202").await.unwrap();

    x.session.start().await.unwrap();
    y.session.start().await.unwrap();
    assert!(x.wait_for_state(MatchState::Connected).await);

    let loaded = wait_until(STATE_TIMEOUT_MS, || {
        let (x_stats, y_stats) = (x_stats.clone(), y_stats.clone());
        async move {
            !x_stats.requested.lock().await.is_empty() && !y_stats.requested.lock().await.is_empty()
        }
    })
    .await;
    assert!(loaded);
    assert_eq!(*x_stats.requested.lock().await, vec![DurableUserId::from("202")]);
    assert_eq!(*y_stats.requested.lock().await, vec![DurableUserId::from("101")]);

    let events = x.events.clone();
    assert!(
        wait_until(STATE_TIMEOUT_MS, || {
            let events = events.clone();
            async move {
                events
                    .all()
                    .await
                    .iter()
                    .any(|e| matches!(e, SessionEvent::PeerStats(stats) if stats.aura_points == 12))
            }
        })
        .await
    );
}
