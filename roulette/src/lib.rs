pub use roulette_core::model::{PeerId, RoomId};

pub mod model {
    pub use roulette_core::model::*;
    pub use roulette_core::paths;
}

#[cfg(feature = "client")]
pub mod client {
    pub use roulette_client::*;
}
