//! Error taxonomy of the session engine.
//!
//! Media and authentication errors end the current start attempt. Matchmaking
//! errors (`RoomDataMissing`, `OfferMissing`, `ClaimConflict`) are recoverable:
//! the caller drops whatever it published and runs find/create again.

use roulette_core::RoomId;
use thiserror::Error;

use crate::media::MediaError;
use crate::store::StoreError;
use crate::transport::NegotiationError;

#[derive(Debug, Error)]
pub enum SessionError {
    /// No anonymous identity, or no durable user id from the host page.
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("camera/microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("no camera or microphone found: {0}")]
    DeviceNotFound(String),

    #[error("camera/microphone busy: {0}")]
    DeviceBusy(String),

    #[error("could not access camera/microphone: {0}")]
    MediaUnknown(String),

    /// A waiting-room entry pointed at a room record that does not exist.
    #[error("room {0} not found; it may have been closed")]
    RoomDataMissing(RoomId),

    #[error("room {0} has no offer")]
    OfferMissing(RoomId),

    /// Another joiner claimed the room first.
    #[error("room {0} was claimed by another peer")]
    ClaimConflict(RoomId),

    #[error("negotiation failed: {0}")]
    NegotiationFailure(#[from] NegotiationError),

    #[error("rendezvous store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl SessionError {
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SessionError::RoomDataMissing(_)
                | SessionError::OfferMissing(_)
                | SessionError::ClaimConflict(_)
        )
    }

    /// Text shown to the user in the status line.
    pub fn status_text(&self) -> String {
        match self {
            SessionError::NotAuthenticated => {
                "Not authenticated. Please wait for authentication or refresh the page.".to_owned()
            }
            SessionError::PermissionDenied(_) => {
                "Camera/Microphone access denied. Please check your permissions.".to_owned()
            }
            SessionError::DeviceNotFound(_) => {
                "No camera or microphone found. Please connect a device.".to_owned()
            }
            SessionError::DeviceBusy(_) => {
                "Camera/Microphone is already in use by another application.".to_owned()
            }
            SessionError::MediaUnknown(_) => {
                "Could not access camera/microphone. Please try again.".to_owned()
            }
            SessionError::RoomDataMissing(_) => {
                "Room may have been closed. Please try again.".to_owned()
            }
            SessionError::OfferMissing(_) => "Peer may not be ready. Please try again.".to_owned(),
            SessionError::ClaimConflict(_) => {
                "Another stranger took that room. Please try again.".to_owned()
            }
            SessionError::NegotiationFailure(e) => format!("Connection failed: {e}"),
            SessionError::StoreUnavailable(_) => {
                "Could not reach the matchmaking service. Please try again.".to_owned()
            }
        }
    }
}

impl From<MediaError> for SessionError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::PermissionDenied(msg) => SessionError::PermissionDenied(msg),
            MediaError::DeviceNotFound(msg) => SessionError::DeviceNotFound(msg),
            MediaError::DeviceBusy(msg) => SessionError::DeviceBusy(msg),
            MediaError::Unknown { name, message } => {
                SessionError::MediaUnknown(format!("{name}: {message}"))
            }
        }
    }
}
