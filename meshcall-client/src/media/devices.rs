use crate::error::DeviceError;
use crate::media::{LocalTrack, TrackSource};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Audio and video acquired in one capture request.
#[derive(Debug, Clone)]
pub struct UserMedia {
    pub audio: Arc<LocalTrack>,
    pub video: Arc<LocalTrack>,
}

/// Capture backend. Each call is one permission-gated device request.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    async fn user_media(&self) -> Result<UserMedia, DeviceError>;

    async fn display_media(&self) -> Result<Arc<LocalTrack>, DeviceError>;
}

/// Devices whose tracks are fed by the application through
/// [`LocalTrack::write_sample`]. Used by headless participants.
#[derive(Debug, Default, Clone)]
pub struct SampleDevices;

#[async_trait]
impl MediaDevices for SampleDevices {
    async fn user_media(&self) -> Result<UserMedia, DeviceError> {
        let media = UserMedia {
            audio: Arc::new(LocalTrack::sample_track(TrackSource::Microphone)),
            video: Arc::new(LocalTrack::sample_track(TrackSource::Camera)),
        };
        debug!(audio = media.audio.id(), video = media.video.id(), "Sample tracks created");
        Ok(media)
    }

    async fn display_media(&self) -> Result<Arc<LocalTrack>, DeviceError> {
        Ok(Arc::new(LocalTrack::sample_track(TrackSource::Screen)))
    }
}
