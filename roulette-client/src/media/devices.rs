use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::media::{LocalMedia, MediaTrack, TrackKind};

/// Reasons camera/microphone acquisition can fail.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("device busy: {0}")]
    DeviceBusy(String),

    #[error("{name}: {message}")]
    Unknown { name: String, message: String },
}

impl MediaError {
    /// Map a getUserMedia `DOMException` name onto the taxonomy.
    pub fn from_dom_name(name: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match name {
            "NotAllowedError" | "PermissionDeniedError" => MediaError::PermissionDenied(message),
            "NotFoundError" | "DevicesNotFoundError" => MediaError::DeviceNotFound(message),
            "NotReadableError" | "TrackStartError" => MediaError::DeviceBusy(message),
            _ => MediaError::Unknown {
                name: name.to_owned(),
                message,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}

/// getUserMedia-style acquisition of local tracks.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn get_user_media(&self, constraints: MediaConstraints) -> Result<LocalMedia, MediaError>;
}

/// Devices that always succeed with placeholder tracks. Used by the simulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticDevices;

#[async_trait]
impl MediaDevices for SyntheticDevices {
    async fn get_user_media(&self, constraints: MediaConstraints) -> Result<LocalMedia, MediaError> {
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::new(
                Uuid::new_v4().to_string(),
                TrackKind::Audio,
                "synthetic microphone",
            ));
        }
        if constraints.video {
            tracks.push(MediaTrack::new(
                Uuid::new_v4().to_string(),
                TrackKind::Video,
                "synthetic camera",
            ));
        }
        if tracks.is_empty() {
            return Err(MediaError::Unknown {
                name: "TypeError".to_owned(),
                message: "at least one of audio and video must be requested".to_owned(),
            });
        }
        Ok(LocalMedia::new(Uuid::new_v4().to_string(), tracks))
    }
}
