use roulette_core::{OnlineCounts, PeerStats};

use crate::media::{LocalMedia, MediaTrack};
use crate::transport::ConnectionState;

/// Where the session is in the find/create/handshake cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Idle,
    Searching,
    CallerWaiting,
    CalleeConnecting,
    Connected,
    Disconnecting,
    PeerLeft,
}

impl std::fmt::Display for MatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatchState::Idle => "idle",
            MatchState::Searching => "searching",
            MatchState::CallerWaiting => "caller-waiting",
            MatchState::CalleeConnecting => "callee-connecting",
            MatchState::Connected => "connected",
            MatchState::Disconnecting => "disconnecting",
            MatchState::PeerLeft => "peer-left",
        };
        f.write_str(name)
    }
}

/// Page visibility as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Everything the session reports to its front end.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Status line text.
    Status { text: String, is_error: bool },

    StateChanged(MatchState),

    /// Whether the start control should accept input.
    StartEnabled(bool),

    /// Whether the next/skip control should accept input.
    NextEnabled(bool),

    /// Local preview is available.
    LocalMedia(LocalMedia),

    RemoteTrack(MediaTrack),

    /// Local and remote video surfaces must be cleared.
    MediaCleared,

    MediaToggled { audio: bool, video: bool },

    ConnectionState(ConnectionState),

    Counts(OnlineCounts),

    PeerStats(PeerStats),

    PeerStatsCleared,
}

impl SessionEvent {
    pub fn status(text: impl Into<String>) -> Self {
        SessionEvent::Status {
            text: text.into(),
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        SessionEvent::Status {
            text: text.into(),
            is_error: true,
        }
    }
}
