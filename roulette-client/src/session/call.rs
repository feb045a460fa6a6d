use std::future::Future;
use std::sync::Arc;

use roulette_core::{DurableUserId, IceCandidate};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::matchmaker::{RoomBinding, close_room};
use crate::media::{LocalMedia, RemoteMedia};
use crate::session::{MatchState, SessionEvent};
use crate::store::{RendezvousStore, encode};
use crate::transport::{NegotiationEvent, Negotiator, NegotiatorFactory, TransportConfig};

const NEGOTIATION_EVENT_BUFFER: usize = 64;

/// Resources exclusively owned by one call attempt.
///
/// Created with a fresh negotiation object and dropped as a whole; nothing
/// here outlives the attempt except the local media handed back by
/// [`ActiveCall::close`].
pub(crate) struct ActiveCall {
    pub(crate) attempt: u64,
    pub(crate) negotiator: Arc<dyn Negotiator>,
    pub(crate) local: LocalMedia,
    pub(crate) remote: RemoteMedia,
    pub(crate) binding: Option<RoomBinding>,
    pub(crate) state: MatchState,
    pub(crate) peer_durable_id: Option<DurableUserId>,
    tasks: JoinSet<()>,
    outbox: watch::Sender<Option<String>>,
}

impl ActiveCall {
    /// New negotiation object with `local` attached and its event pump running.
    pub(crate) async fn open(
        attempt: u64,
        factory: &dyn NegotiatorFactory,
        config: &TransportConfig,
        local: LocalMedia,
        store: Arc<dyn RendezvousStore>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let (negotiation_tx, negotiation_rx) = mpsc::channel(NEGOTIATION_EVENT_BUFFER);
        let negotiator = factory.create(config, negotiation_tx).await?;
        if let Err(e) = negotiator.add_local_tracks(&local).await {
            if let Err(close_err) = negotiator.close().await {
                warn!("Failed to close negotiation object: {}", close_err);
            }
            return Err(e.into());
        }

        let (outbox, outbox_rx) = watch::channel(None);
        let remote = RemoteMedia::default();
        let mut tasks = JoinSet::new();
        tasks.spawn(pump_negotiation_events(
            negotiation_rx,
            outbox_rx,
            store,
            remote.clone(),
            events,
        ));

        debug!("Opened call attempt {}", attempt);
        Ok(Self {
            attempt,
            negotiator,
            local,
            remote,
            binding: None,
            state: MatchState::Searching,
            peer_durable_id: None,
            tasks,
            outbox,
        })
    }

    /// Attach the attempt to a room. Local candidates start flowing to it.
    pub(crate) fn bind(&mut self, binding: RoomBinding) {
        self.outbox
            .send_replace(Some(binding.local_candidates_path()));
        self.peer_durable_id = binding.peer_durable_id.clone();
        self.binding = Some(binding);
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut JoinSet<()> {
        &mut self.tasks
    }

    pub(crate) fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    /// Cancel every listener, optionally delete the room, stop remote tracks
    /// and close the negotiation object. Never fails. Local media is returned
    /// untouched so the caller decides whether it survives.
    pub(crate) async fn close(mut self, store: &dyn RendezvousStore, delete_room: bool) -> LocalMedia {
        self.tasks.shutdown().await;

        if delete_room {
            if let Some(binding) = &self.binding {
                match close_room(store, &binding.room_id).await {
                    Ok(()) => info!("Deleted room {}", binding.room_id),
                    Err(e) => warn!("Failed to delete room {}: {}", binding.room_id, e),
                }
            }
        }

        self.remote.stop_all().await;
        if let Err(e) = self.negotiator.close().await {
            warn!("Failed to close negotiation object of attempt {}: {}", self.attempt, e);
        }
        debug!("Closed call attempt {}", self.attempt);
        self.local
    }
}

/// Route negotiation-object events: publish local candidates once a room is
/// bound, surface state changes and collect remote tracks.
async fn pump_negotiation_events(
    mut negotiation_rx: mpsc::Receiver<NegotiationEvent>,
    mut outbox: watch::Receiver<Option<String>>,
    store: Arc<dyn RendezvousStore>,
    remote: RemoteMedia,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let mut pending: Vec<IceCandidate> = Vec::new();

    loop {
        tokio::select! {
            changed = outbox.changed() => {
                if changed.is_err() {
                    break;
                }
                let target = outbox.borrow_and_update().clone();
                if let Some(path) = target {
                    for candidate in pending.drain(..) {
                        publish_candidate(store.as_ref(), &path, &candidate).await;
                    }
                }
            }
            event = negotiation_rx.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    NegotiationEvent::CandidateGenerated(candidate) => {
                        let target = outbox.borrow().clone();
                        match target {
                            Some(path) => publish_candidate(store.as_ref(), &path, &candidate).await,
                            None => pending.push(candidate),
                        }
                    }
                    NegotiationEvent::StateChanged(state) => {
                        let _ = events.send(SessionEvent::status(format!(
                            "WebRTC Connection State: {state}"
                        )));
                        let _ = events.send(SessionEvent::ConnectionState(state));
                    }
                    NegotiationEvent::RemoteTrack(track) => {
                        info!("Remote {:?} track {} arrived", track.kind(), track.id());
                        remote.add(track.clone()).await;
                        let _ = events.send(SessionEvent::RemoteTrack(track));
                    }
                }
            }
        }
    }
}

async fn publish_candidate(store: &dyn RendezvousStore, path: &str, candidate: &IceCandidate) {
    let value = match encode(path, candidate) {
        Ok(value) => value,
        Err(e) => {
            warn!("{}", e);
            return;
        }
    };
    match store.push(path, value).await {
        Ok(key) => debug!("Published local candidate {} to '{}'", key, path),
        Err(e) => warn!("Failed to publish local candidate to '{}': {}", path, e),
    }
}
