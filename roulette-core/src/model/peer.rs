use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Ephemeral anonymous id issued by the identity provider. One per tab.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application-level user id supplied by the host page.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(transparent)]
pub struct DurableUserId(pub String);

impl DurableUserId {
    /// Host pages render a missing user as an empty string or the literal `None`.
    pub fn is_valid(&self) -> bool {
        let trimmed = self.0.trim();
        !trimmed.is_empty() && trimmed != "None"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DurableUserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl fmt::Display for DurableUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The local peer as seen by the rendezvous store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentity {
    pub peer_id: PeerId,
    pub durable_id: DurableUserId,
}

impl PeerIdentity {
    pub fn new(peer_id: PeerId, durable_id: DurableUserId) -> Self {
        Self {
            peer_id,
            durable_id,
        }
    }
}
