use crate::admission::{AdmissionController, AdmissionEffect};
use crate::config::ClientConfig;
use crate::media::{
    CaptureOutcome, CaptureRequest, MediaDevices, MediaHandle, MediaTrackController, TrackFanout,
};
use crate::negotiation::NegotiationContext;
use crate::registry::PeerConnectionRegistry;
use crate::session::{CallEvent, CallHandle, SessionCommand};
use crate::signaling::{
    ChannelState, Connector, SignalingChannel, SignalingOutput, WebSocketConnector,
};
use crate::transport::{RtcTransportFactory, TransportConfig, TransportEvent, TransportFactory};
use meshcall_core::{ParticipantId, SignalingMessage};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Who we are in which meeting.
#[derive(Debug, Clone)]
pub struct SessionIdentity {
    pub meeting_code: String,
    pub participant_id: ParticipantId,
    pub display_name: String,
}

/// Event loop of one call: signaling, admission, local media and every peer
/// connection are driven from here, one input at a time.
pub struct CallSession {
    identity: SessionIdentity,
    channel: Arc<SignalingChannel>,
    admission: AdmissionController,
    media: MediaTrackController,
    registry: PeerConnectionRegistry,
    inbound_rx: mpsc::UnboundedReceiver<SignalingMessage>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    command_rx: mpsc::Receiver<SessionCommand>,
    track_ended_rx: mpsc::UnboundedReceiver<String>,
    capture_tx: mpsc::UnboundedSender<CaptureOutcome>,
    capture_rx: mpsc::UnboundedReceiver<CaptureOutcome>,
    events: mpsc::UnboundedSender<CallEvent>,
}

impl CallSession {
    pub async fn new(
        identity: SessionIdentity,
        config: &ClientConfig,
        connector: Arc<dyn Connector>,
        transports: Arc<dyn TransportFactory>,
        devices: Arc<dyn MediaDevices>,
    ) -> (Self, CallHandle, mpsc::UnboundedReceiver<CallEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(64);
        let (transport_tx, transport_rx) = mpsc::channel(256);
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (track_ended_tx, track_ended_rx) = mpsc::unbounded_channel();
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();

        let channel = Arc::new(SignalingChannel::new(config, connector));
        channel
            .on_message(Arc::new(move |message| {
                let _ = inbound_tx.send(message);
            }))
            .await;

        let media = MediaTrackController::new(devices, track_ended_tx);
        let ctx = NegotiationContext::new(
            identity.participant_id.clone(),
            transports,
            channel.clone(),
            media.handle(),
            transport_tx,
        );
        let registry = PeerConnectionRegistry::new(ctx, events_tx.clone());

        let session = Self {
            identity,
            channel,
            admission: AdmissionController::new(),
            media,
            registry,
            inbound_rx,
            transport_rx,
            command_rx,
            track_ended_rx,
            capture_tx,
            capture_rx,
            events: events_tx,
        };
        (session, CallHandle::new(command_tx), events_rx)
    }

    /// WebSocket signaling and WebRTC peer connections.
    pub async fn with_webrtc(
        identity: SessionIdentity,
        config: &ClientConfig,
        devices: Arc<dyn MediaDevices>,
    ) -> (Self, CallHandle, mpsc::UnboundedReceiver<CallEvent>) {
        let transports = RtcTransportFactory::new(TransportConfig::from(config));
        Self::new(
            identity,
            config,
            Arc::new(WebSocketConnector),
            Arc::new(transports),
            devices,
        )
        .await
    }

    pub fn media(&self) -> MediaHandle {
        self.media.handle()
    }

    pub fn signaling_state(&self) -> watch::Receiver<ChannelState> {
        self.channel.state_changes()
    }

    /// Runs until hangup, or until every [`CallHandle`] is dropped.
    pub async fn run(mut self) {
        info!(
            meeting = %self.identity.meeting_code,
            participant = %self.identity.participant_id,
            "Call session started"
        );

        let signaling = match self.channel.connect(
            &self.identity.meeting_code,
            &self.identity.participant_id,
            &self.identity.display_name,
        ) {
            Ok(task) => task,
            Err(e) => {
                error!("Cannot start signaling: {}", e);
                self.hangup().await;
                return;
            }
        };

        loop {
            tokio::select! {
                msg = self.inbound_rx.recv() => {
                    match msg {
                        Some(m) => self.handle_message(m).await,
                        None => {
                            warn!("Signaling handler dropped");
                            break;
                        }
                    }
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => {
                            if !self.handle_command(c).await {
                                break;
                            }
                        }
                        None => {
                            info!("All call handles dropped. Hanging up.");
                            break;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.registry.handle_transport_event(evt).await;
                }

                Some(outcome) = self.capture_rx.recv() => {
                    self.handle_capture(outcome).await;
                }

                Some(track_id) = self.track_ended_rx.recv() => {
                    if self.media.handle_track_ended(&track_id, &mut self.registry).await.is_some() {
                        self.emit_local_media().await;
                    }
                }
            }
        }

        self.hangup().await;
        if let Err(e) = signaling.await {
            warn!("Signaling task ended abnormally: {}", e);
        }
        info!("Call session finished");
    }

    async fn handle_message(&mut self, message: SignalingMessage) {
        match message {
            SignalingMessage::Init(init) => {
                let effects = self.admission.on_init(&init);
                self.apply_admission(effects).await;
            }
            SignalingMessage::Admitted => {
                let effects = self.admission.on_admitted();
                self.apply_admission(effects).await;
            }
            SignalingMessage::WaitingRoomUpdate(update) => {
                let effects = self.admission.on_waiting_room_update(update);
                self.apply_admission(effects).await;
            }
            SignalingMessage::ParticipantJoined(joined) => {
                self.registry
                    .participant_joined(joined.participant_id, joined.name)
                    .await;
            }
            SignalingMessage::ParticipantLeft(left) => {
                self.registry.participant_left(&left.participant_id).await;
            }
            SignalingMessage::Signal(content) => {
                self.registry.handle_signal(content).await;
            }
            SignalingMessage::Chat(chat) => {
                self.emit(CallEvent::Chat(chat));
            }
        }
    }

    async fn apply_admission(&mut self, effects: Vec<AdmissionEffect>) {
        for effect in effects {
            match effect {
                AdmissionEffect::ShowWaitingRoom => {
                    self.emit(CallEvent::AdmissionChanged(self.admission.state()));
                    self.emit(CallEvent::ShowWaitingRoom);
                }
                AdmissionEffect::StartMedia => {
                    self.emit(CallEvent::AdmissionChanged(self.admission.state()));
                    self.start_media().await;
                }
                AdmissionEffect::UpdateRoster(waiting) => {
                    self.emit(CallEvent::WaitingRoomUpdated(waiting));
                }
            }
        }
    }

    /// Returns false when the session should stop.
    async fn handle_command(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::StartMedia => {
                if self.admission.state().in_meeting() {
                    self.start_media().await;
                } else {
                    warn!("Cannot start media while {}", self.admission.state());
                }
            }
            SessionCommand::ToggleAudio => {
                self.media.toggle_audio().await;
                self.emit_local_media().await;
            }
            SessionCommand::ToggleVideo => {
                self.media.toggle_video().await;
                self.emit_local_media().await;
            }
            SessionCommand::StartScreenShare => {
                self.request_capture(CaptureRequest::Screen).await;
            }
            SessionCommand::StopScreenShare => {
                if self
                    .media
                    .stop_screen_share(&mut self.registry)
                    .await
                    .is_some()
                {
                    self.emit_local_media().await;
                }
            }
            SessionCommand::SendChat(text) => {
                let text = text.trim();
                if text.is_empty() {
                    debug!("Not sending empty chat message");
                } else {
                    self.channel.send(SignalingMessage::chat(text)).await;
                }
            }
            SessionCommand::Hangup => return false,
        }
        true
    }

    async fn start_media(&mut self) {
        self.request_capture(CaptureRequest::UserMedia).await;
    }

    /// Device prompts stay open as long as the user wants; the loop keeps
    /// serving peers until the outcome comes back on `capture_rx`.
    async fn request_capture(&mut self, request: CaptureRequest) {
        match self
            .media
            .request_capture(request, self.capture_tx.clone())
            .await
        {
            Ok(true) => info!("Waiting for {:?} capture", request),
            Ok(false) => {}
            Err(e) => {
                error!("Cannot request {:?} capture: {}", request, e);
                self.emit(CallEvent::DeviceError(e));
            }
        }
    }

    async fn handle_capture(&mut self, outcome: CaptureOutcome) {
        match outcome {
            CaptureOutcome::UserMedia(result) => match self.media.finish_user_media(result).await {
                Ok(true) => {
                    self.emit(CallEvent::MediaStarted);
                    self.emit_local_media().await;

                    // Peers that connected before capture get the tracks now.
                    let published = self.media.handle().published().await;
                    for track in published.iter() {
                        self.registry.replace_track(track.clone()).await;
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    error!("Failed to start local media: {}", e);
                    self.emit(CallEvent::DeviceError(e));
                }
            },
            CaptureOutcome::Screen(result) => {
                match self
                    .media
                    .finish_screen_share(result, &mut self.registry)
                    .await
                {
                    Ok(report) => {
                        for (peer, reason) in &report.failed {
                            warn!("Screen share not delivered to {}: {}", peer, reason);
                        }
                        self.emit_local_media().await;
                    }
                    Err(e) => {
                        error!("Screen share failed: {}", e);
                        self.emit(CallEvent::DeviceError(e));
                    }
                }
            }
        }
    }

    async fn emit_local_media(&self) {
        let state = self.media.handle();
        let state = state.read().await;
        self.emit(CallEvent::LocalMediaChanged {
            audio_enabled: state.audio_enabled(),
            video_enabled: state.video_enabled(),
            video_source: state.video_source(),
        });
    }

    async fn hangup(&mut self) {
        info!("Hanging up");
        self.registry.close_all().await;
        self.media.stop_all().await;
        self.channel.close();
        self.emit(CallEvent::HungUp);
    }

    fn emit(&self, event: CallEvent) {
        let _ = self.events.send(event);
    }
}
