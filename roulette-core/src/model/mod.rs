mod peer;
mod presence;
mod room;
mod signaling;
mod stats;

pub use peer::{DurableUserId, PeerId, PeerIdentity};
pub use presence::{OnlineCounts, PresenceRecord};
pub use room::{RoomId, RoomRecord, RoomStatus, WaitingRoomEntry};
pub use signaling::{IceCandidate, IceServerConfig, SdpType, SessionDescription};
pub use stats::PeerStats;
