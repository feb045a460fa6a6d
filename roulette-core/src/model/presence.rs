use serde::{Deserialize, Serialize};

/// Liveness flag at `presence/{peerId}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub online: bool,
    pub last_seen: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OnlineCounts {
    /// Distinct creator/joiner ids across rooms and waiting rooms.
    pub online: usize,
    /// Number of waiting-room entries.
    pub waiting: usize,
}
