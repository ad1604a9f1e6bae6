use crate::error::DeviceError;
use crate::media::{LocalTrack, MediaDevices, TrackKind, UserMedia};
use async_trait::async_trait;
use meshcall_core::ParticipantId;
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoSource {
    Camera,
    Screen,
}

/// The tracks currently offered to peers: at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct PublishedTracks {
    pub audio: Option<Arc<LocalTrack>>,
    pub video: Option<Arc<LocalTrack>>,
}

impl PublishedTracks {
    pub fn of_kind(&self, kind: TrackKind) -> Option<&Arc<LocalTrack>> {
        match kind {
            TrackKind::Audio => self.audio.as_ref(),
            TrackKind::Video => self.video.as_ref(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LocalTrack>> {
        self.audio.iter().chain(self.video.iter())
    }
}

#[derive(Debug)]
pub struct LocalMediaState {
    audio: Option<Arc<LocalTrack>>,
    camera: Option<Arc<LocalTrack>>,
    screen: Option<Arc<LocalTrack>>,
    audio_enabled: bool,
    video_enabled: bool,
}

impl Default for LocalMediaState {
    fn default() -> Self {
        Self {
            audio: None,
            camera: None,
            screen: None,
            audio_enabled: true,
            video_enabled: true,
        }
    }
}

impl LocalMediaState {
    pub fn published(&self) -> PublishedTracks {
        PublishedTracks {
            audio: self.audio.clone(),
            video: self.screen.clone().or_else(|| self.camera.clone()),
        }
    }

    pub fn video_source(&self) -> VideoSource {
        if self.screen.is_some() {
            VideoSource::Screen
        } else {
            VideoSource::Camera
        }
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio_enabled
    }

    pub fn video_enabled(&self) -> bool {
        self.video_enabled
    }

    pub fn camera(&self) -> Option<&Arc<LocalTrack>> {
        self.camera.as_ref()
    }

    pub fn screen(&self) -> Option<&Arc<LocalTrack>> {
        self.screen.as_ref()
    }
}

/// Shared read access to local media. Only [`MediaTrackController`] writes.
#[derive(Debug, Clone, Default)]
pub struct MediaHandle(Arc<RwLock<LocalMediaState>>);

impl MediaHandle {
    pub async fn published(&self) -> PublishedTracks {
        self.0.read().await.published()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, LocalMediaState> {
        self.0.read().await
    }
}

/// Outcome of pushing one track to every peer.
#[derive(Debug, Default)]
pub struct FanoutReport {
    pub replaced: Vec<ParticipantId>,
    /// Peers mid-negotiation; they pick the track up once stable.
    pub deferred: Vec<ParticipantId>,
    pub failed: Vec<(ParticipantId, String)>,
}

/// Something that can swap a track on all of its peer connections.
#[async_trait]
pub trait TrackFanout: Send {
    async fn replace_track(&mut self, track: Arc<LocalTrack>) -> FanoutReport;
}

/// Device request that can be run off the caller's task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRequest {
    UserMedia,
    Screen,
}

/// What a device request produced, delivered back over an mpsc.
#[derive(Debug)]
pub enum CaptureOutcome {
    UserMedia(Result<UserMedia, DeviceError>),
    Screen(Result<Arc<LocalTrack>, DeviceError>),
}

impl CaptureOutcome {
    /// Nobody is left to take the tracks: stop them.
    fn discard(self) {
        match self {
            CaptureOutcome::UserMedia(Ok(media)) => {
                media.audio.stop();
                media.video.stop();
            }
            CaptureOutcome::Screen(Ok(screen)) => screen.stop(),
            CaptureOutcome::UserMedia(Err(_)) | CaptureOutcome::Screen(Err(_)) => {}
        }
    }
}

/// Owns local capture: start, mute toggles, and screen share.
///
/// Device requests can block for as long as a permission prompt or screen
/// picker stays open. [`MediaTrackController::request_capture`] runs them on
/// their own task and at most one is in flight; `start` and
/// `start_screen_share` await the devices directly.
pub struct MediaTrackController {
    devices: Arc<dyn MediaDevices>,
    state: MediaHandle,
    started: bool,
    pending: Option<CaptureRequest>,
    ended_tx: mpsc::UnboundedSender<String>,
    screen_watch: Option<JoinHandle<()>>,
}

impl MediaTrackController {
    /// `ended_tx` receives the id of the screen track when capture ends
    /// outside the client's control.
    pub fn new(devices: Arc<dyn MediaDevices>, ended_tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            devices,
            state: MediaHandle::default(),
            started: false,
            pending: None,
            ended_tx,
            screen_watch: None,
        }
    }

    pub fn handle(&self) -> MediaHandle {
        self.state.clone()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn pending_capture(&self) -> Option<CaptureRequest> {
        self.pending
    }

    /// Acquire microphone and camera. Returns `Ok(false)` when media was
    /// already running; devices are only asked once.
    pub async fn start(&mut self) -> Result<bool, DeviceError> {
        if self.started {
            debug!("Local media already started");
            return Ok(false);
        }
        let media = self.devices.user_media().await?;
        Ok(self.install_user_media(media).await)
    }

    /// Spawn a device request. The outcome is sent on `done` and has to be
    /// handed back through `finish_user_media` or `finish_screen_share`.
    ///
    /// `Ok(false)` when there is nothing to capture or another request is
    /// still pending. A screen request before media started is an error.
    pub async fn request_capture(
        &mut self,
        request: CaptureRequest,
        done: mpsc::UnboundedSender<CaptureOutcome>,
    ) -> Result<bool, DeviceError> {
        if let Some(pending) = self.pending {
            debug!("{:?} capture still pending, ignoring {:?} request", pending, request);
            return Ok(false);
        }
        match request {
            CaptureRequest::UserMedia if self.started => {
                debug!("Local media already started");
                return Ok(false);
            }
            CaptureRequest::UserMedia => {}
            CaptureRequest::Screen => {
                if !self.started {
                    return Err(DeviceError::NotStarted);
                }
                if self.state.0.read().await.screen.is_some() {
                    debug!("Screen share already active");
                    return Ok(false);
                }
            }
        }

        let devices = self.devices.clone();
        tokio::spawn(async move {
            let outcome = match request {
                CaptureRequest::UserMedia => CaptureOutcome::UserMedia(devices.user_media().await),
                CaptureRequest::Screen => CaptureOutcome::Screen(devices.display_media().await),
            };
            if let Err(mpsc::error::SendError(outcome)) = done.send(outcome) {
                debug!("Capture finished after its receiver went away");
                outcome.discard();
            }
        });

        self.pending = Some(request);
        debug!("{:?} capture requested", request);
        Ok(true)
    }

    /// Apply a spawned user-media request. `Ok(true)` when media started.
    pub async fn finish_user_media(
        &mut self,
        result: Result<UserMedia, DeviceError>,
    ) -> Result<bool, DeviceError> {
        self.pending = None;
        Ok(self.install_user_media(result?).await)
    }

    /// Apply a spawned screen request and put the screen on every peer.
    pub async fn finish_screen_share(
        &mut self,
        result: Result<Arc<LocalTrack>, DeviceError>,
        fanout: &mut dyn TrackFanout,
    ) -> Result<FanoutReport, DeviceError> {
        self.pending = None;
        self.install_screen(result?, fanout).await
    }

    pub async fn toggle_audio(&self) -> bool {
        let mut state = self.state.0.write().await;
        state.audio_enabled = !state.audio_enabled;
        if let Some(audio) = &state.audio {
            audio.set_enabled(state.audio_enabled);
        }
        debug!("Audio enabled: {}", state.audio_enabled);
        state.audio_enabled
    }

    /// Applies to whichever video track is live, camera or screen.
    pub async fn toggle_video(&self) -> bool {
        let mut state = self.state.0.write().await;
        state.video_enabled = !state.video_enabled;
        for track in state.camera.iter().chain(state.screen.iter()) {
            track.set_enabled(state.video_enabled);
        }
        debug!("Video enabled: {}", state.video_enabled);
        state.video_enabled
    }

    /// Capture the screen and put it on every peer's video slot in place of
    /// the camera. Does nothing while already sharing.
    pub async fn start_screen_share(
        &mut self,
        fanout: &mut dyn TrackFanout,
    ) -> Result<FanoutReport, DeviceError> {
        if !self.started {
            return Err(DeviceError::NotStarted);
        }
        if self.state.0.read().await.screen.is_some() {
            debug!("Screen share already active");
            return Ok(FanoutReport::default());
        }

        let screen = self.devices.display_media().await?;
        self.install_screen(screen, fanout).await
    }

    /// Stop sharing and restore the camera. `None` when not sharing.
    pub async fn stop_screen_share(
        &mut self,
        fanout: &mut dyn TrackFanout,
    ) -> Option<FanoutReport> {
        let (screen, camera) = {
            let mut state = self.state.0.write().await;
            let screen = state.screen.take()?;
            (screen, state.camera.clone())
        };

        if let Some(watch) = self.screen_watch.take() {
            watch.abort();
        }
        screen.stop();
        info!(track = screen.id(), "Screen share stopped");

        match camera {
            Some(camera) => Some(fanout.replace_track(camera).await),
            None => {
                warn!("No camera track to restore after screen share");
                Some(FanoutReport::default())
            }
        }
    }

    /// Track ended outside the client (e.g. the user revoked the share).
    /// Only the live screen track is acted on; stale ids are ignored.
    pub async fn handle_track_ended(
        &mut self,
        track_id: &str,
        fanout: &mut dyn TrackFanout,
    ) -> Option<FanoutReport> {
        let is_current_screen = self
            .state
            .0
            .read()
            .await
            .screen
            .as_ref()
            .is_some_and(|screen| screen.id() == track_id);

        if !is_current_screen {
            debug!("Ignoring end of inactive track {}", track_id);
            return None;
        }

        info!("Screen capture ended externally");
        self.stop_screen_share(fanout).await
    }

    /// Stop every local track. Used on hangup.
    pub async fn stop_all(&mut self) {
        if let Some(watch) = self.screen_watch.take() {
            watch.abort();
        }

        let mut state = self.state.0.write().await;
        for track in [state.audio.take(), state.camera.take(), state.screen.take()]
            .into_iter()
            .flatten()
        {
            track.stop();
        }
        self.started = false;
    }

    async fn install_user_media(&mut self, media: UserMedia) -> bool {
        if self.started {
            debug!("Local media already started, dropping new capture");
            media.audio.stop();
            media.video.stop();
            return false;
        }

        let mut state = self.state.0.write().await;
        media.audio.set_enabled(state.audio_enabled);
        media.video.set_enabled(state.video_enabled);
        info!(
            audio = media.audio.id(),
            video = media.video.id(),
            "Local media started"
        );
        state.audio = Some(media.audio);
        state.camera = Some(media.video);
        self.started = true;
        true
    }

    async fn install_screen(
        &mut self,
        screen: Arc<LocalTrack>,
        fanout: &mut dyn TrackFanout,
    ) -> Result<FanoutReport, DeviceError> {
        if !self.started {
            screen.stop();
            return Err(DeviceError::NotStarted);
        }
        {
            let mut state = self.state.0.write().await;
            if state.screen.is_some() {
                debug!("Screen share already active, dropping new capture");
                screen.stop();
                return Ok(FanoutReport::default());
            }
            screen.set_enabled(state.video_enabled);
            state.screen = Some(screen.clone());
        }

        let mut ended = screen.ended();
        let ended_tx = self.ended_tx.clone();
        let track_id = screen.id().to_owned();
        self.screen_watch = Some(tokio::spawn(async move {
            if ended.wait_for(|ended| *ended).await.is_ok() {
                let _ = ended_tx.send(track_id);
            }
        }));

        info!(track = screen.id(), "Screen share started");
        Ok(fanout.replace_track(screen).await)
    }
}
