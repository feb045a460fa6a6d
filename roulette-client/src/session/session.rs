use std::sync::{Arc, Weak};

use roulette_core::utils::now_millis;
use roulette_core::{DurableUserId, PeerIdentity, RoomId};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::identity::IdentityProvider;
use crate::matchmaker::{HandshakeContext, MatchEvent, Matchmaker, Role, start_handshake};
use crate::media::{LocalMedia, MediaConstraints, MediaDevices, RemoteMedia, SyntheticDevices, TrackKind};
use crate::presence::{PresenceTracker, watch_online_counts};
use crate::reaper::reap_stale_records;
use crate::session::call::ActiveCall;
use crate::session::{MatchState, SessionEvent, Visibility};
use crate::stats::{HttpPeerStats, PeerStatsSource};
use crate::store::RendezvousStore;
use crate::transport::{NegotiatorFactory, RtcNegotiatorFactory, TransportConfig};

/// Configures and spawns a [`Session`].
pub struct SessionBuilder {
    config: SessionConfig,
    store: Arc<dyn RendezvousStore>,
    devices: Arc<dyn MediaDevices>,
    negotiators: Arc<dyn NegotiatorFactory>,
    peer_stats: Option<Arc<dyn PeerStatsSource>>,
}

impl SessionBuilder {
    pub fn new(store: Arc<dyn RendezvousStore>) -> Self {
        Self {
            config: SessionConfig::default(),
            store,
            devices: Arc::new(SyntheticDevices),
            negotiators: Arc::new(RtcNegotiatorFactory),
            peer_stats: None,
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn media_devices(mut self, devices: Arc<dyn MediaDevices>) -> Self {
        self.devices = devices;
        self
    }

    pub fn negotiator_factory(mut self, negotiators: Arc<dyn NegotiatorFactory>) -> Self {
        self.negotiators = negotiators;
        self
    }

    /// Overrides the HTTP client built from `peer_stats_url`.
    pub fn peer_stats(mut self, source: Arc<dyn PeerStatsSource>) -> Self {
        self.peer_stats = Some(source);
        self
    }

    /// Spawns the match-event driver, so this must run inside a Tokio runtime.
    pub fn build(self) -> (Session, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let (match_tx, match_rx) = mpsc::unbounded_channel();

        let peer_stats = self.peer_stats.or_else(|| {
            self.config
                .peer_stats_url
                .as_ref()
                .map(|url| Arc::new(HttpPeerStats::new(url.clone())) as Arc<dyn PeerStatsSource>)
        });

        let inner = Arc::new(SessionInner {
            transport: TransportConfig::from(&self.config),
            config: self.config,
            store: self.store,
            devices: self.devices,
            negotiators: self.negotiators,
            peer_stats,
            events,
            match_tx,
            state: Mutex::new(SessionState::default()),
        });
        tokio::spawn(drive_match_events(Arc::downgrade(&inner), match_rx));

        (Session { inner }, events_rx)
    }
}

/// One browser tab's chat session.
///
/// Lifecycle operations (`start`, `stop`, `next`, departure-triggered
/// re-matching) are serialized; each runs to completion before the next one
/// observes the session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    transport: TransportConfig,
    store: Arc<dyn RendezvousStore>,
    devices: Arc<dyn MediaDevices>,
    negotiators: Arc<dyn NegotiatorFactory>,
    peer_stats: Option<Arc<dyn PeerStatsSource>>,
    events: mpsc::UnboundedSender<SessionEvent>,
    match_tx: mpsc::UnboundedSender<MatchEvent>,
    state: Mutex<SessionState>,
}

struct SessionState {
    identity: Option<PeerIdentity>,
    presence: Option<PresenceTracker>,
    counts: Option<JoinHandle<()>>,
    /// `None` while idle.
    call: Option<ActiveCall>,
    next_attempt: u64,
    audio_enabled: bool,
    video_enabled: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            identity: None,
            presence: None,
            counts: None,
            call: None,
            next_attempt: 0,
            audio_enabled: true,
            video_enabled: true,
        }
    }
}

impl Drop for SessionState {
    fn drop(&mut self) {
        if let Some(counts) = self.counts.take() {
            counts.abort();
        }
    }
}

impl Session {
    /// Sign in anonymously, pair the id with the host's durable user id and
    /// begin presence tracking.
    ///
    /// Runs the stale-record reaper first. Presence or count failures are
    /// logged only; the session is usable without them.
    pub async fn authenticate(
        &self,
        provider: &dyn IdentityProvider,
        durable_id: DurableUserId,
    ) -> Result<PeerIdentity, SessionError> {
        let inner = &self.inner;
        if !durable_id.is_valid() {
            inner.emit(SessionEvent::error("Authentication required to start."));
            return Err(SessionError::NotAuthenticated);
        }
        let peer_id = match provider.sign_in_anonymously().await {
            Ok(peer_id) => peer_id,
            Err(e) => {
                inner.emit(SessionEvent::error(format!(
                    "Error: Could not authenticate. {e}"
                )));
                return Err(e);
            }
        };

        let identity = PeerIdentity::new(peer_id, durable_id);
        info!("Authenticated as {} ({})", identity.peer_id, identity.durable_id);

        let mut state = inner.state.lock().await;
        if state.call.is_some() {
            inner.teardown(&mut state, true).await;
            inner.emit(SessionEvent::StateChanged(MatchState::Idle));
        }
        state.identity = Some(identity.clone());

        let report = reap_stale_records(
            inner.store.as_ref(),
            now_millis(),
            inner.config.stale_room_threshold(),
        )
        .await;
        debug!("Stale record scan finished: {:?}", report);

        if state.counts.is_none() {
            state.counts = inner.start_counts().await;
        }

        inner.emit(SessionEvent::StartEnabled(true));
        inner.emit(SessionEvent::status(
            "Authentication successful. Click 'Start Chat' to begin.",
        ));

        if let Some(previous) = state.presence.take() {
            previous.stop().await;
        }
        inner.resume_presence(&mut state).await;

        Ok(identity)
    }

    /// End the session for good: stop any call, remove presence and stop
    /// count aggregation. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if state.call.is_some() {
            inner.emit(SessionEvent::StateChanged(MatchState::Disconnecting));
        }
        inner.teardown(&mut state, true).await;
        if let Some(presence) = state.presence.take() {
            presence.stop().await;
        }
        if let Some(counts) = state.counts.take() {
            counts.abort();
        }
        state.identity = None;

        inner.emit(SessionEvent::StateChanged(MatchState::Idle));
        inner.emit(SessionEvent::StartEnabled(false));
        inner.emit(SessionEvent::NextEnabled(false));
        info!("Session shut down");
    }

    /// Identity was revoked by the host page.
    pub async fn sign_out(&self) {
        self.shutdown().await;
        self.inner
            .emit(SessionEvent::error("Authentication required to start."));
    }

    /// Acquire media and find or create a room.
    pub async fn start(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;
        if state.call.is_some() {
            warn!("Start requested while a chat is already active");
            return Ok(());
        }

        inner.emit(SessionEvent::StartEnabled(false));
        inner.emit(SessionEvent::status("Starting video chat..."));
        inner.resume_presence(&mut state).await;

        match inner.acquire_and_match(&mut state).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Error starting chat: {}", e);
                inner.emit(SessionEvent::StateChanged(MatchState::Idle));
                inner.emit(SessionEvent::StartEnabled(true));
                inner.emit(SessionEvent::error(e.status_text()));
                Err(e)
            }
        }
    }

    /// Leave the current chat and release everything it held, presence
    /// included; the next `start` publishes it again. Never fails.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        if state.call.is_some() {
            inner.emit(SessionEvent::StateChanged(MatchState::Disconnecting));
            inner.emit(SessionEvent::status("Ending chat..."));
        }
        inner.teardown(&mut state, true).await;
        if let Some(presence) = state.presence.take() {
            presence.stop().await;
        }

        inner.emit(SessionEvent::StateChanged(MatchState::Idle));
        inner.emit(SessionEvent::StartEnabled(state.identity.is_some()));
        inner.emit(SessionEvent::NextEnabled(false));
        inner.emit(SessionEvent::status(
            "Chat ended. Click Start Chat to begin a new chat.",
        ));
    }

    /// Skip to the next stranger.
    pub async fn next(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        let mut state = inner.state.lock().await;

        inner.emit(SessionEvent::NextEnabled(false));
        if state.call.is_some() {
            inner.emit(SessionEvent::StateChanged(MatchState::Disconnecting));
        }
        inner.teardown(&mut state, true).await;
        inner.emit(SessionEvent::status("Finding a new stranger..."));
        inner.resume_presence(&mut state).await;

        match inner.acquire_and_match(&mut state).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Error finding next chat: {}", e);
                inner.emit(SessionEvent::StateChanged(MatchState::Idle));
                inner.emit(SessionEvent::StartEnabled(state.identity.is_some()));
                inner.emit(SessionEvent::NextEnabled(true));
                inner.emit(SessionEvent::error(e.status_text()));
                Err(e)
            }
        }
    }

    pub async fn set_audio_enabled(&self, enabled: bool) {
        self.set_track_enabled(TrackKind::Audio, enabled).await;
    }

    pub async fn set_video_enabled(&self, enabled: bool) {
        self.set_track_enabled(TrackKind::Video, enabled).await;
    }

    /// Flip the microphone. Returns the new state.
    pub async fn toggle_audio(&self) -> bool {
        let enabled = !self.inner.state.lock().await.audio_enabled;
        self.set_audio_enabled(enabled).await;
        enabled
    }

    /// Flip the camera. Returns the new state.
    pub async fn toggle_video(&self) -> bool {
        let enabled = !self.inner.state.lock().await.video_enabled;
        self.set_video_enabled(enabled).await;
        enabled
    }

    async fn set_track_enabled(&self, kind: TrackKind, enabled: bool) {
        let mut state = self.inner.state.lock().await;
        match kind {
            TrackKind::Audio => state.audio_enabled = enabled,
            TrackKind::Video => state.video_enabled = enabled,
        }
        if let Some(call) = &state.call {
            call.local.set_enabled(kind, enabled);
        }
        self.inner.emit(SessionEvent::MediaToggled {
            audio: state.audio_enabled,
            video: state.video_enabled,
        });
    }

    /// Flag presence offline or online right away instead of waiting for the heartbeat.
    pub async fn set_visibility(&self, visibility: Visibility) {
        let state = self.inner.state.lock().await;
        let Some(presence) = &state.presence else {
            return;
        };
        if let Err(e) = presence.set_visible(visibility == Visibility::Visible).await {
            warn!("Failed to update presence visibility: {}", e);
        }
    }

    pub async fn identity(&self) -> Option<PeerIdentity> {
        self.inner.state.lock().await.identity.clone()
    }

    pub async fn match_state(&self) -> MatchState {
        let state = self.inner.state.lock().await;
        state.call.as_ref().map_or(MatchState::Idle, |call| call.state)
    }

    pub async fn room_id(&self) -> Option<RoomId> {
        let state = self.inner.state.lock().await;
        state
            .call
            .as_ref()
            .and_then(|call| call.binding.as_ref())
            .map(|binding| binding.room_id.clone())
    }

    pub async fn role(&self) -> Option<Role> {
        let state = self.inner.state.lock().await;
        state
            .call
            .as_ref()
            .and_then(|call| call.binding.as_ref())
            .map(|binding| binding.role)
    }

    /// `(audio, video)` toggle flags.
    pub async fn media_enabled(&self) -> (bool, bool) {
        let state = self.inner.state.lock().await;
        (state.audio_enabled, state.video_enabled)
    }

    pub async fn local_media(&self) -> Option<LocalMedia> {
        let state = self.inner.state.lock().await;
        state.call.as_ref().map(|call| call.local.clone())
    }

    pub async fn remote_media(&self) -> Option<RemoteMedia> {
        let state = self.inner.state.lock().await;
        state.call.as_ref().map(|call| call.remote.clone())
    }

    pub async fn is_tracking_presence(&self) -> bool {
        self.inner.state.lock().await.presence.is_some()
    }
}

impl SessionInner {
    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("No listener for session events");
        }
    }

    async fn start_counts(&self) -> Option<JoinHandle<()>> {
        let (counts_tx, mut counts_rx) = mpsc::unbounded_channel();
        let watcher = match watch_online_counts(self.store.clone(), counts_tx).await {
            Ok(watcher) => watcher,
            Err(e) => {
                warn!("Online counts unavailable: {}", e);
                return None;
            }
        };

        let events = self.events.clone();
        tokio::spawn(async move {
            while let Some(counts) = counts_rx.recv().await {
                if events.send(SessionEvent::Counts(counts)).is_err() {
                    break;
                }
            }
        });
        Some(watcher)
    }

    /// Publish presence for the signed-in peer unless it is already tracked.
    /// Failures are logged only.
    async fn resume_presence(&self, state: &mut SessionState) {
        if state.presence.is_some() {
            return;
        }
        let Some(identity) = &state.identity else {
            return;
        };
        match PresenceTracker::start(
            self.store.clone(),
            &identity.peer_id,
            self.config.presence_interval(),
        )
        .await
        {
            Ok(tracker) => state.presence = Some(tracker),
            Err(e) => warn!("Presence tracking unavailable: {}", e),
        }
    }

    /// One acquire+match cycle. Recoverable matchmaking errors restart
    /// find/create with a fresh negotiation object until the configured number
    /// of claims has been lost.
    async fn acquire_and_match(&self, state: &mut SessionState) -> Result<(), SessionError> {
        let identity = state
            .identity
            .clone()
            .filter(|identity| identity.durable_id.is_valid())
            .ok_or(SessionError::NotAuthenticated)?;

        let local = self
            .devices
            .get_user_media(MediaConstraints::default())
            .await?;
        local.set_enabled(TrackKind::Audio, state.audio_enabled);
        local.set_enabled(TrackKind::Video, state.video_enabled);
        self.emit(SessionEvent::LocalMedia(local.clone()));

        let matchmaker = Matchmaker::new(self.store.clone(), identity);
        loop {
            state.next_attempt += 1;
            let attempt = state.next_attempt;

            self.emit(SessionEvent::StateChanged(MatchState::Searching));
            self.emit(SessionEvent::status("Looking for a stranger..."));

            match self.try_match(&matchmaker, attempt, local.clone()).await {
                Ok(call) => {
                    state.call = Some(call);
                    return Ok(());
                }
                // Dangling entries are already gone from the index and retry
                // at once; only claims lost to another joiner are capped.
                Err(e)
                    if e.is_recoverable()
                        && matchmaker.lost_claims() < self.config.max_match_attempts =>
                {
                    let backoff = self.config.retry_backoff(matchmaker.lost_claims());
                    warn!(
                        "Matchmaking attempt {} failed ({}), retrying in {:?}",
                        attempt, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    local.stop_all();
                    self.emit(SessionEvent::MediaCleared);
                    return Err(e);
                }
            }
        }
    }

    async fn try_match(
        &self,
        matchmaker: &Matchmaker,
        attempt: u64,
        local: LocalMedia,
    ) -> Result<ActiveCall, SessionError> {
        let mut call = ActiveCall::open(
            attempt,
            self.negotiators.as_ref(),
            &self.transport,
            local,
            self.store.clone(),
            self.events.clone(),
        )
        .await?;

        let binding = match matchmaker.find_or_create_room(call.negotiator.as_ref()).await {
            Ok(binding) => binding,
            Err(e) => {
                call.close(self.store.as_ref(), false).await;
                return Err(e);
            }
        };
        call.bind(binding.clone());

        let ctx = HandshakeContext {
            attempt,
            binding: binding.clone(),
            local_peer: matchmaker.identity().peer_id.clone(),
            negotiator: call.negotiator.clone(),
            events: self.match_tx.clone(),
        };
        if let Err(e) = start_handshake(self.store.as_ref(), ctx, call.tasks_mut()).await {
            call.close(self.store.as_ref(), true).await;
            return Err(e.into());
        }

        match binding.role {
            Role::Caller => {
                call.state = MatchState::CallerWaiting;
                self.emit(SessionEvent::StateChanged(MatchState::CallerWaiting));
            }
            Role::Callee => {
                self.emit(SessionEvent::StateChanged(MatchState::CalleeConnecting));
                self.emit(SessionEvent::status("Connecting to stranger..."));
                call.state = MatchState::Connected;
                self.emit(SessionEvent::StateChanged(MatchState::Connected));
                self.emit(SessionEvent::status("Connected to stranger!"));
                self.emit(SessionEvent::NextEnabled(true));
                self.spawn_peer_stats(&mut call);
            }
        }
        Ok(call)
    }

    fn spawn_peer_stats(&self, call: &mut ActiveCall) {
        let Some(source) = self.peer_stats.clone() else {
            return;
        };
        let Some(durable_id) = call.peer_durable_id.clone().filter(DurableUserId::is_valid) else {
            warn!("Peer durable id unknown, skipping peer stats");
            return;
        };

        let events = self.events.clone();
        call.spawn(async move {
            match source.fetch(&durable_id).await {
                Ok(stats) => {
                    let _ = events.send(SessionEvent::PeerStats(stats));
                }
                Err(e) => warn!("Could not load peer stats for {}: {}", durable_id, e),
            }
        });
    }

    /// Release the current attempt. Local tracks are stopped and toggles reset.
    async fn teardown(&self, state: &mut SessionState, delete_room: bool) {
        if let Some(call) = state.call.take() {
            let local = call.close(self.store.as_ref(), delete_room).await;
            local.stop_all();
        }
        state.audio_enabled = true;
        state.video_enabled = true;

        self.emit(SessionEvent::MediaCleared);
        self.emit(SessionEvent::PeerStatsCleared);
        self.emit(SessionEvent::MediaToggled {
            audio: true,
            video: true,
        });
    }

    async fn handle_match_event(&self, event: MatchEvent) {
        let mut state = self.state.lock().await;
        // Events of a torn-down attempt are dropped here. This is also what
        // keeps a second departure report from re-matching twice: the first
        // one replaces the attempt while holding the state lock.
        let current = state.call.as_ref().map(|call| call.attempt);
        if current != Some(event.attempt()) {
            debug!("Ignoring {:?} from a superseded attempt", event);
            return;
        }

        match event {
            MatchEvent::AnswerApplied {
                peer_durable_id, ..
            } => {
                let Some(call) = state.call.as_mut() else {
                    return;
                };
                if peer_durable_id.is_some() {
                    call.peer_durable_id = peer_durable_id;
                }
                call.state = MatchState::Connected;
                self.emit(SessionEvent::StateChanged(MatchState::Connected));
                self.emit(SessionEvent::status("Stranger connected!"));
                self.emit(SessionEvent::NextEnabled(true));
                self.spawn_peer_stats(call);
            }
            MatchEvent::PeerLeft { room_id, .. } => {
                self.rematch(&mut state, &room_id, false).await;
            }
            MatchEvent::Superseded { room_id, .. } => {
                // A caller still owns the room and must not leave it behind.
                let owns_room = state
                    .call
                    .as_ref()
                    .and_then(|call| call.binding.as_ref())
                    .is_some_and(|binding| binding.role == Role::Caller);
                self.rematch(&mut state, &room_id, owns_room).await;
            }
            MatchEvent::HandshakeFailed { reason, .. } => {
                error!("Handshake failed: {}", reason);
                self.teardown(&mut state, true).await;
                self.emit(SessionEvent::StateChanged(MatchState::Idle));
                self.emit(SessionEvent::StartEnabled(state.identity.is_some()));
                self.emit(SessionEvent::NextEnabled(false));
                self.emit(SessionEvent::error(format!("Connection failed: {reason}")));
            }
        }
    }

    async fn rematch(&self, state: &mut SessionState, room_id: &RoomId, delete_room: bool) {
        info!("Peer left room {}, finding a new partner", room_id);
        if let Some(call) = state.call.as_mut() {
            call.state = MatchState::PeerLeft;
        }
        self.emit(SessionEvent::StateChanged(MatchState::PeerLeft));
        self.emit(SessionEvent::status("Stranger has left. Finding a new partner..."));
        self.teardown(state, delete_room).await;

        if let Err(e) = self.acquire_and_match(state).await {
            error!("Error finding new chat after peer left: {}", e);
            self.emit(SessionEvent::StateChanged(MatchState::Idle));
            self.emit(SessionEvent::StartEnabled(state.identity.is_some()));
            self.emit(SessionEvent::NextEnabled(true));
            self.emit(SessionEvent::error("Error finding new chat. Please try again."));
        }
    }
}

async fn drive_match_events(session: Weak<SessionInner>, mut match_rx: mpsc::UnboundedReceiver<MatchEvent>) {
    while let Some(event) = match_rx.recv().await {
        let Some(inner) = session.upgrade() else {
            break;
        };
        inner.handle_match_event(event).await;
    }
    debug!("Match event driver stopped");
}
