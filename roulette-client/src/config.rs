use std::time::Duration;

use roulette_core::IceServerConfig;
use roulette_core::utils::{DEFAULT_STUN_ADDR, DEFAULT_STUN_ADDR_2};
use serde::Deserialize;

/// Tunables of one browser-tab session.
///
/// The stale-room threshold and the presence interval are independent; nothing
/// derives one from the other.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub ice_servers: Vec<IceServerConfig>,
    pub ice_candidate_pool_size: u8,
    pub stale_room_threshold_ms: u64,
    pub presence_interval_ms: u64,
    /// Claims lost to another joiner before a start attempt gives up.
    pub max_match_attempts: u32,
    pub match_retry_backoff_ms: u64,
    /// Base URL of the peer-stats endpoint. Stats are not fetched when unset.
    pub peer_stats_url: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig {
                urls: vec![DEFAULT_STUN_ADDR.to_owned(), DEFAULT_STUN_ADDR_2.to_owned()],
                username: None,
                credential: None,
            }],
            ice_candidate_pool_size: 10,
            stale_room_threshold_ms: 120_000,
            presence_interval_ms: 30_000,
            max_match_attempts: 3,
            match_retry_backoff_ms: 250,
            peer_stats_url: None,
        }
    }
}

impl SessionConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    pub fn stale_room_threshold(&self) -> Duration {
        Duration::from_millis(self.stale_room_threshold_ms)
    }

    pub fn presence_interval(&self) -> Duration {
        Duration::from_millis(self.presence_interval_ms)
    }

    /// Backoff before retrying after `lost_claims` lost claims. Zero before the first.
    pub fn retry_backoff(&self, lost_claims: u32) -> Duration {
        Duration::from_millis(self.match_retry_backoff_ms.saturating_mul(u64::from(lost_claims)))
    }
}
