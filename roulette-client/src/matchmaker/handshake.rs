//! Store listeners that drive one call attempt after find/create succeeded.
//!
//! Every listener is subscribed before its task is spawned, so nothing
//! committed after [`start_handshake`] returns can be missed. Tasks live in the
//! caller's `JoinSet`; aborting the set drops the subscriptions with them.

use std::sync::Arc;

use roulette_core::{IceCandidate, PeerId, RoomRecord, paths};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::matchmaker::{MatchEvent, Role, RoomBinding};
use crate::store::{RendezvousStore, StoreError, StoreEvent, Subscription, decode};
use crate::transport::Negotiator;

/// Everything the handshake tasks of one attempt share.
#[derive(Clone)]
pub struct HandshakeContext {
    pub attempt: u64,
    pub binding: RoomBinding,
    pub local_peer: PeerId,
    pub negotiator: Arc<dyn Negotiator>,
    pub events: mpsc::UnboundedSender<MatchEvent>,
}

impl HandshakeContext {
    fn emit(&self, event: MatchEvent) {
        if self.events.send(event).is_err() {
            debug!("Session gone, dropping match event for attempt {}", self.attempt);
        }
    }
}

/// Subscribe to the room and spawn the listeners for our role.
///
/// Caller: answer watcher, callee-candidate applier, departure monitor.
/// Callee: caller-candidate applier, departure monitor. The callee applied the
/// offer during the claim, so its candidates can be applied straight away.
pub async fn start_handshake(
    store: &dyn RendezvousStore,
    ctx: HandshakeContext,
    tasks: &mut JoinSet<()>,
) -> Result<(), StoreError> {
    let room_path = paths::room(&ctx.binding.room_id);
    let (ready_tx, ready_rx) = watch::channel(ctx.binding.role == Role::Callee);

    let departure = store.watch_value(&room_path).await?;
    let candidates = store
        .watch_children(&ctx.binding.remote_candidates_path())
        .await?;
    let answer = match ctx.binding.role {
        Role::Caller => Some(store.watch_value(&room_path).await?),
        Role::Callee => None,
    };

    if let Some(answer) = answer {
        tasks.spawn(watch_answer(answer, ctx.clone(), ready_tx));
    }
    tasks.spawn(apply_remote_candidates(candidates, ctx.clone(), ready_rx));
    tasks.spawn(monitor_departure(departure, ctx.clone()));

    info!(
        "Handshake started for room {} as {} (attempt {})",
        ctx.binding.room_id, ctx.binding.role, ctx.attempt
    );
    Ok(())
}

/// Apply the joiner's answer exactly once.
async fn watch_answer(mut sub: Subscription, ctx: HandshakeContext, ready: watch::Sender<bool>) {
    while let Some(event) = sub.recv().await {
        let StoreEvent::Value(Some(value)) = event else {
            continue;
        };
        let room: RoomRecord = match decode(sub.path(), value) {
            Ok(room) => room,
            Err(e) => {
                warn!("Skipping unreadable room snapshot: {}", e);
                continue;
            }
        };
        let Some(answer) = room.answer.filter(|answer| answer.is_complete()) else {
            continue;
        };
        if ctx.negotiator.has_remote_description().await {
            continue;
        }

        match ctx.negotiator.set_remote_description(answer).await {
            Ok(()) => {
                info!("Answer applied for room {}", ctx.binding.room_id);
                ready.send_replace(true);
                ctx.emit(MatchEvent::AnswerApplied {
                    attempt: ctx.attempt,
                    peer_durable_id: room.joiner_durable_id,
                });
            }
            Err(e) => {
                warn!("Failed to apply answer for room {}: {}", ctx.binding.room_id, e);
                ctx.emit(MatchEvent::HandshakeFailed {
                    attempt: ctx.attempt,
                    reason: e.to_string(),
                });
            }
        }
        break;
    }
}

/// Feed every candidate the other peer appends into our negotiation object.
async fn apply_remote_candidates(
    mut sub: Subscription,
    ctx: HandshakeContext,
    mut ready: watch::Receiver<bool>,
) {
    // Candidates need a remote description first; the subscription buffers meanwhile.
    if ready.wait_for(|ready| *ready).await.is_err() {
        return;
    }

    while let Some(event) = sub.recv().await {
        let StoreEvent::ChildAdded { key, value } = event else {
            continue;
        };
        let candidate: IceCandidate = match decode(sub.path(), value) {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!("Skipping malformed candidate {}: {}", key, e);
                continue;
            }
        };
        match ctx.negotiator.add_ice_candidate(candidate).await {
            Ok(()) => debug!("Applied remote candidate {} in room {}", key, ctx.binding.room_id),
            Err(e) => warn!("Error adding ICE candidate {}: {}", key, e),
        }
    }
}

/// Report the room's disappearance, or a joiner other than the one we paired with.
async fn monitor_departure(mut sub: Subscription, ctx: HandshakeContext) {
    let mut paired_with: Option<String> = match ctx.binding.role {
        Role::Callee => Some(ctx.local_peer.to_string()),
        Role::Caller => None,
    };

    while let Some(event) = sub.recv().await {
        let StoreEvent::Value(value) = event else {
            continue;
        };
        let Some(room) = value else {
            info!("Room {} deleted, peer has left", ctx.binding.room_id);
            ctx.emit(MatchEvent::PeerLeft {
                attempt: ctx.attempt,
                room_id: ctx.binding.room_id.clone(),
            });
            return;
        };

        let Some(joiner) = room.get("joinerId").and_then(Value::as_str) else {
            continue;
        };
        match &paired_with {
            None => paired_with = Some(joiner.to_owned()),
            Some(expected) if expected == joiner => {}
            Some(expected) => {
                warn!(
                    "Room {} was taken over by {} (expected {})",
                    ctx.binding.room_id, joiner, expected
                );
                ctx.emit(MatchEvent::Superseded {
                    attempt: ctx.attempt,
                    room_id: ctx.binding.room_id.clone(),
                });
                return;
            }
        }
    }
}
