use roulette_core::IceCandidate;

use crate::media::MediaTrack;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::New => "new",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Failed => "failed",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Events a negotiation object raises for the session that owns it.
#[derive(Debug, Clone)]
pub enum NegotiationEvent {
    /// Local ICE candidate gathered; must be appended to our candidate collection.
    CandidateGenerated(IceCandidate),

    StateChanged(ConnectionState),

    /// The remote peer started sending a track.
    RemoteTrack(MediaTrack),
}
