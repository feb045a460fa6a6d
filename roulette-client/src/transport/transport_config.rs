use roulette_core::IceServerConfig;

use crate::config::SessionConfig;

/// Settings for each new negotiation object.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub ice_candidate_pool_size: u8,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::from(&SessionConfig::default())
    }
}

impl From<&SessionConfig> for TransportConfig {
    fn from(config: &SessionConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
            ice_candidate_pool_size: config.ice_candidate_pool_size,
        }
    }
}
