use std::sync::Arc;

use async_trait::async_trait;
use roulette_core::{IceCandidate, SessionDescription};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::media::LocalMedia;
use crate::transport::{NegotiationEvent, TransportConfig};

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("webrtc error: {0}")]
    Rtc(#[from] webrtc::Error),

    #[error("unsupported session description type: {0:?}")]
    UnsupportedDescription(roulette_core::SdpType),

    #[error("invalid negotiation state: {0}")]
    InvalidState(String),
}

/// One offer/answer/ICE negotiation. Never reused once closed.
#[async_trait]
pub trait Negotiator: Send + Sync {
    async fn add_local_tracks(&self, media: &LocalMedia) -> Result<(), NegotiationError>;

    async fn create_offer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn create_answer(&self) -> Result<SessionDescription, NegotiationError>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<(), NegotiationError>;

    async fn set_remote_description(&self, desc: SessionDescription)
    -> Result<(), NegotiationError>;

    async fn has_remote_description(&self) -> bool;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), NegotiationError>;

    async fn close(&self) -> Result<(), NegotiationError>;
}

/// Builds a fresh negotiation object for every call attempt.
#[async_trait]
pub trait NegotiatorFactory: Send + Sync {
    /// `event_tx` receives candidates, state changes and remote tracks of the new object.
    async fn create(
        &self,
        config: &TransportConfig,
        event_tx: mpsc::Sender<NegotiationEvent>,
    ) -> Result<Arc<dyn Negotiator>, NegotiationError>;
}
