mod negotiator;
mod rtc_negotiator;
mod transport_config;
mod transport_event;

pub use negotiator::*;
pub use rtc_negotiator::*;
pub use transport_config::*;
pub use transport_event::*;
