//! Session engine of the roulette video chat: anonymous peers meet through a
//! shared rendezvous store, exchange offer/answer/ICE data there and talk
//! peer-to-peer.

pub mod config;
pub mod error;
pub mod identity;
pub mod matchmaker;
pub mod media;
pub mod presence;
pub mod reaper;
pub mod session;
pub mod stats;
pub mod store;
pub mod transport;

pub use config::SessionConfig;
pub use error::SessionError;
pub use identity::{AnonymousIdentityProvider, IdentityProvider};
pub use matchmaker::{Matchmaker, Role, RoomBinding};
pub use session::{MatchState, Session, SessionBuilder, SessionEvent, Visibility};
pub use store::{MemoryStore, RendezvousStore};
