use anyhow::Result;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

pub const LOCAL_STREAM_ID: &str = "meshcall-local";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => f.write_str("audio"),
            TrackKind::Video => f.write_str("video"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

impl TrackSource {
    pub fn kind(&self) -> TrackKind {
        match self {
            TrackSource::Microphone => TrackKind::Audio,
            TrackSource::Camera | TrackSource::Screen => TrackKind::Video,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            TrackSource::Microphone => "mic",
            TrackSource::Camera => "camera",
            TrackSource::Screen => "screen",
        }
    }
}

/// A locally captured track.
///
/// The enabled flag mutes without touching any peer connection: samples
/// written while disabled are dropped. `stop` ends the track for good and
/// wakes anyone waiting on [`LocalTrack::ended`].
pub struct LocalTrack {
    id: String,
    source: TrackSource,
    rtp: Arc<TrackLocalStaticSample>,
    enabled: AtomicBool,
    ended: watch::Sender<bool>,
}

impl LocalTrack {
    pub fn new(source: TrackSource, rtp: Arc<TrackLocalStaticSample>) -> Self {
        let (ended, _) = watch::channel(false);
        Self {
            id: rtp.id().to_owned(),
            source,
            rtp,
            enabled: AtomicBool::new(true),
            ended,
        }
    }

    /// Track with the default codec for its kind, fed through `write_sample`.
    pub fn sample_track(source: TrackSource) -> Self {
        let capability = match source.kind() {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        let id = format!("{}-{}", source.label(), Uuid::new_v4());
        let rtp = TrackLocalStaticSample::new(capability, id, LOCAL_STREAM_ID.to_owned());
        Self::new(source, Arc::new(rtp))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.source.kind()
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn rtp_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.rtp.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_ended(&self) -> bool {
        *self.ended.borrow()
    }

    pub fn stop(&self) {
        self.ended.send_replace(true);
    }

    pub fn ended(&self) -> watch::Receiver<bool> {
        self.ended.subscribe()
    }

    pub async fn write_sample(&self, sample: &Sample) -> Result<()> {
        if !self.is_enabled() || self.is_ended() {
            return Ok(());
        }
        self.rtp.write_sample(sample).await?;
        Ok(())
    }
}

impl fmt::Debug for LocalTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrack")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("enabled", &self.is_enabled())
            .field("ended", &self.is_ended())
            .finish()
    }
}
