use serde::{Deserialize, Serialize};

/// Payload of `GET /get-peer-stats/{durableId}/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerStats {
    pub success: bool,
    #[serde(default)]
    pub is_new_user: bool,
    #[serde(default)]
    pub aura_points: i64,
    #[serde(default)]
    pub avg_rating: f64,
    #[serde(default)]
    pub total_ratings: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
