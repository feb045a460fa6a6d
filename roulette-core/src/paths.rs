//! Path layout of the rendezvous store.

use crate::model::{PeerId, RoomId};

pub const ROOMS: &str = "rooms";
pub const WAITING_ROOMS: &str = "waiting_rooms";
pub const PRESENCE: &str = "presence";

pub fn room(id: &RoomId) -> String {
    format!("{ROOMS}/{id}")
}

pub fn waiting_room(id: &RoomId) -> String {
    format!("{WAITING_ROOMS}/{id}")
}

pub fn caller_candidates(id: &RoomId) -> String {
    format!("{ROOMS}/{id}/callerCandidates")
}

pub fn callee_candidates(id: &RoomId) -> String {
    format!("{ROOMS}/{id}/calleeCandidates")
}

pub fn presence(peer_id: &PeerId) -> String {
    format!("{PRESENCE}/{peer_id}")
}
