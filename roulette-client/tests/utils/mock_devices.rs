use std::sync::Arc;

use async_trait::async_trait;
use roulette_client::media::{
    LocalMedia, MediaConstraints, MediaDevices, MediaError, MediaTrack, TrackKind,
};
use tokio::sync::Mutex;

/// Media devices that either hand out fresh tracks or fail with a fixed DOM error name.
pub struct MockMediaDevices {
    failure: Option<String>,
    issued: Mutex<Vec<LocalMedia>>,
}

impl MockMediaDevices {
    pub fn working() -> Arc<Self> {
        Arc::new(Self {
            failure: None,
            issued: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(dom_name: &str) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(dom_name.to_owned()),
            issued: Mutex::new(Vec::new()),
        })
    }

    /// Every stream handed out so far, oldest first.
    pub async fn issued(&self) -> Vec<LocalMedia> {
        self.issued.lock().await.clone()
    }
}

#[async_trait]
impl MediaDevices for MockMediaDevices {
    async fn get_user_media(&self, _constraints: MediaConstraints) -> Result<LocalMedia, MediaError> {
        if let Some(name) = &self.failure {
            return Err(MediaError::from_dom_name(name, "mock device failure"));
        }

        let mut issued = self.issued.lock().await;
        let n = issued.len();
        let media = LocalMedia::new(
            format!("stream-{n}"),
            vec![
                MediaTrack::new(format!("audio-{n}"), TrackKind::Audio, "mock microphone"),
                MediaTrack::new(format!("video-{n}"), TrackKind::Video, "mock camera"),
            ],
        );
        issued.push(media.clone());
        Ok(media)
    }
}
