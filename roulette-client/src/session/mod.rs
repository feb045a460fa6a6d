mod call;
mod session;
mod session_event;

pub use session::*;
pub use session_event::*;
