use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::peer::{DurableUserId, PeerId, PeerIdentity};
use crate::model::signaling::{IceCandidate, SessionDescription};

#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for RoomId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Full,
}

/// A signaling session between one creator (caller) and at most one joiner (callee).
///
/// Stored at `rooms/{roomId}`. The offer is embedded at creation so a joiner
/// never observes a waiting room without one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomRecord {
    pub creator_id: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_durable_id: Option<DurableUserId>,
    pub status: RoomStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<SessionDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joiner_id: Option<PeerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joiner_durable_id: Option<DurableUserId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub caller_candidates: BTreeMap<String, IceCandidate>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub callee_candidates: BTreeMap<String, IceCandidate>,
}

impl RoomRecord {
    pub fn waiting(creator: &PeerIdentity, offer: SessionDescription, created_at: u64) -> Self {
        Self {
            creator_id: creator.peer_id.clone(),
            creator_durable_id: Some(creator.durable_id.clone()),
            status: RoomStatus::Waiting,
            created_at: Some(created_at),
            offer: Some(offer),
            answer: None,
            joiner_id: None,
            joiner_durable_id: None,
            caller_candidates: BTreeMap::new(),
            callee_candidates: BTreeMap::new(),
        }
    }

    /// The offer a joiner can apply, if the creator published a usable one.
    pub fn usable_offer(&self) -> Option<&SessionDescription> {
        self.offer.as_ref().filter(|offer| offer.is_complete())
    }

    pub fn waiting_entry(&self) -> WaitingRoomEntry {
        WaitingRoomEntry {
            creator_id: self.creator_id.clone(),
            creator_durable_id: self.creator_durable_id.clone(),
            status: RoomStatus::Waiting,
            created_at: self.created_at,
        }
    }

    pub fn involves(&self, peer_id: &PeerId) -> bool {
        &self.creator_id == peer_id || self.joiner_id.as_ref() == Some(peer_id)
    }
}

/// Index record at `waiting_rooms/{roomId}` advertising a room that still needs a joiner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WaitingRoomEntry {
    pub creator_id: PeerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_durable_id: Option<DurableUserId>,
    pub status: RoomStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
}
