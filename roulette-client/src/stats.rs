use async_trait::async_trait;
use roulette_core::{DurableUserId, PeerStats};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("peer stats request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("peer stats rejected: {0}")]
    Rejected(String),
}

/// Reputation data about the matched peer. Only used to decorate the UI.
#[async_trait]
pub trait PeerStatsSource: Send + Sync {
    async fn fetch(&self, durable_id: &DurableUserId) -> Result<PeerStats, StatsError>;
}

/// Client of `GET {base}/get-peer-stats/{durableId}/`.
#[derive(Debug, Clone)]
pub struct HttpPeerStats {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPeerStats {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        }
    }

    pub fn url_for(&self, durable_id: &DurableUserId) -> String {
        format!("{}/get-peer-stats/{}/", self.base_url, durable_id)
    }
}

#[async_trait]
impl PeerStatsSource for HttpPeerStats {
    async fn fetch(&self, durable_id: &DurableUserId) -> Result<PeerStats, StatsError> {
        let url = self.url_for(durable_id);
        debug!("Fetching peer stats from {}", url);

        let stats: PeerStats = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !stats.success {
            return Err(StatsError::Rejected(
                stats.error.unwrap_or_else(|| "unknown error".to_owned()),
            ));
        }
        Ok(stats)
    }
}
