use roulette_core::{DurableUserId, RoomId, paths};

/// Which side of the offer/answer exchange the local peer plays in a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Created the room and published the offer.
    Caller,
    /// Claimed a waiting room and published the answer.
    Callee,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Caller => f.write_str("caller"),
            Role::Callee => f.write_str("callee"),
        }
    }
}

/// Result of a successful find/create: the room we are bound to and our role in it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomBinding {
    pub room_id: RoomId,
    pub role: Role,
    /// Known immediately for a callee; a caller learns it from the joiner fields.
    pub peer_durable_id: Option<DurableUserId>,
}

impl RoomBinding {
    /// Collection our locally gathered candidates are appended to.
    pub fn local_candidates_path(&self) -> String {
        match self.role {
            Role::Caller => paths::caller_candidates(&self.room_id),
            Role::Callee => paths::callee_candidates(&self.room_id),
        }
    }

    /// Collection the other peer appends its candidates to.
    pub fn remote_candidates_path(&self) -> String {
        match self.role {
            Role::Caller => paths::callee_candidates(&self.room_id),
            Role::Callee => paths::caller_candidates(&self.room_id),
        }
    }
}

/// Notifications from handshake tasks back to the session that owns them.
///
/// Every event carries the attempt it belongs to; events of a superseded
/// attempt are ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    /// Caller side: the joiner's answer was applied.
    AnswerApplied {
        attempt: u64,
        peer_durable_id: Option<DurableUserId>,
    },

    /// The room record disappeared.
    PeerLeft { attempt: u64, room_id: RoomId },

    /// Another joiner's claim overwrote the one this attempt is paired with.
    Superseded { attempt: u64, room_id: RoomId },

    /// A handshake task hit an unrecoverable negotiation error.
    HandshakeFailed { attempt: u64, reason: String },
}

impl MatchEvent {
    pub fn attempt(&self) -> u64 {
        match self {
            MatchEvent::AnswerApplied { attempt, .. }
            | MatchEvent::PeerLeft { attempt, .. }
            | MatchEvent::Superseded { attempt, .. }
            | MatchEvent::HandshakeFailed { attempt, .. } => *attempt,
        }
    }
}
