mod handshake;
mod match_event;
mod matchmaker;

pub use handshake::*;
pub use match_event::*;
pub use matchmaker::*;
