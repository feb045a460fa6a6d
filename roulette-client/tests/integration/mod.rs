
use anyhow::{Context, Result, ensure};
use roulette_client::{MatchState, MemoryStore, Role};
use roulette_core::RoomId;
use tracing::Level;

use crate::utils::TestPeer;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Authenticate two peers and let the first create a room the second joins.
pub async fn connected_pair(store: &MemoryStore) -> Result<(TestPeer, TestPeer, RoomId)> {
    let caller = TestPeer::authenticated(store, "101").await?;
    let callee = TestPeer::authenticated(store, "202").await?;

    caller.session.start().await.context("Caller failed to start")?;
    ensure!(caller.session.role().await == Some(Role::Caller), "first peer is not the caller");

    callee.session.start().await.context("Callee failed to start")?;
    ensure!(callee.session.role().await == Some(Role::Callee), "second peer is not the callee");

    ensure!(
        caller.wait_for_state(MatchState::Connected).await,
        "caller never saw the answer"
    );

    let room_id = caller
        .session
        .room_id()
        .await
        .context("Caller has no room")?;
    ensure!(
        callee.session.room_id().await.as_ref() == Some(&room_id),
        "peers are in different rooms"
    );
    Ok((caller, callee, room_id))
}
