use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use roulette_client::media::LocalMedia;
use roulette_client::transport::{
    NegotiationError, NegotiationEvent, Negotiator, NegotiatorFactory, TransportConfig,
};
use roulette_core::{IceCandidate, SessionDescription};
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Default)]
struct MockNegotiatorState {
    tracks_added: usize,
    local: Option<SessionDescription>,
    remote: Option<SessionDescription>,
    remote_candidates: Vec<IceCandidate>,
    closed: bool,
}

/// Negotiation object that fabricates SDP and emits one local candidate per
/// `set_local_description`. Rejects a second remote description.
pub struct MockNegotiator {
    pub id: u64,
    state: Mutex<MockNegotiatorState>,
    event_tx: mpsc::Sender<NegotiationEvent>,
}

impl MockNegotiator {
    pub fn new(id: u64, event_tx: mpsc::Sender<NegotiationEvent>) -> Self {
        Self {
            id,
            state: Mutex::new(MockNegotiatorState::default()),
            event_tx,
        }
    }

    pub async fn tracks_added(&self) -> usize {
        self.state.lock().await.tracks_added
    }

    pub async fn local_description(&self) -> Option<SessionDescription> {
        self.state.lock().await.local.clone()
    }

    pub async fn remote_description(&self) -> Option<SessionDescription> {
        self.state.lock().await.remote.clone()
    }

    pub async fn remote_candidates(&self) -> Vec<IceCandidate> {
        self.state.lock().await.remote_candidates.clone()
    }

    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    fn candidate(&self) -> IceCandidate {
        IceCandidate {
            candidate: format!("candidate:mock-{} 1 udp 2122260223 10.0.0.1 5000 typ host", self.id),
            sdp_mid: Some("0".to_owned()),
            sdp_m_line_index: Some(0),
            username_fragment: None,
        }
    }
}

#[async_trait]
impl Negotiator for MockNegotiator {
    async fn add_local_tracks(&self, media: &LocalMedia) -> Result<(), NegotiationError> {
        self.state.lock().await.tracks_added += media.tracks().len();
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError> {
        Ok(SessionDescription::offer(format!(
            "v=0\r\no=mock-{} 0 0 IN IP4 0.0.0.0\r\ns=offer\r\n",
            self.id
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError> {
        if self.state.lock().await.remote.is_none() {
            return Err(NegotiationError::InvalidState(
                "answer requested before an offer was applied".to_owned(),
            ));
        }
        Ok(SessionDescription::answer(format!(
            "v=0\r\no=mock-{} 0 0 IN IP4 0.0.0.0\r\ns=answer\r\n",
            self.id
        )))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError> {
        self.state.lock().await.local = Some(desc);
        let _ = self
            .event_tx
            .send(NegotiationEvent::CandidateGenerated(self.candidate()))
            .await;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: SessionDescription,
    ) -> Result<(), NegotiationError> {
        let mut state = self.state.lock().await;
        if state.remote.is_some() {
            return Err(NegotiationError::InvalidState(
                "remote description already set".to_owned(),
            ));
        }
        state.remote = Some(desc);
        Ok(())
    }

    async fn has_remote_description(&self) -> bool {
        self.state.lock().await.remote.is_some()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError> {
        let mut state = self.state.lock().await;
        if state.remote.is_none() {
            return Err(NegotiationError::InvalidState(
                "candidate before remote description".to_owned(),
            ));
        }
        state.remote_candidates.push(candidate);
        Ok(())
    }

    async fn close(&self) -> Result<(), NegotiationError> {
        self.state.lock().await.closed = true;
        Ok(())
    }
}

/// Unique across factories so SDP and candidates identify their origin.
static NEXT_NEGOTIATOR_ID: AtomicU64 = AtomicU64::new(1);

/// Hands out [`MockNegotiator`]s and remembers every one it created.
#[derive(Default)]
pub struct MockNegotiatorFactory {
    created: Mutex<Vec<Arc<MockNegotiator>>>,
}

impl MockNegotiatorFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn created(&self) -> Vec<Arc<MockNegotiator>> {
        self.created.lock().await.clone()
    }

    pub async fn created_count(&self) -> usize {
        self.created.lock().await.len()
    }

    pub async fn last(&self) -> Option<Arc<MockNegotiator>> {
        self.created.lock().await.last().cloned()
    }
}

#[async_trait]
impl NegotiatorFactory for MockNegotiatorFactory {
    async fn create(
        &self,
        _config: &TransportConfig,
        event_tx: mpsc::Sender<NegotiationEvent>,
    ) -> Result<Arc<dyn Negotiator>, NegotiationError> {
        let id = NEXT_NEGOTIATOR_ID.fetch_add(1, Ordering::Relaxed);
        let negotiator = Arc::new(MockNegotiator::new(id, event_tx));
        self.created.lock().await.push(negotiator.clone());
        Ok(negotiator)
    }
}
