use crate::media::{LocalTrack, PublishedTracks, TrackKind};
use crate::transport::{
    ConnectionId, LinkState, PeerTransport, SessionDescription, TransportConfig, TransportEvent,
    TransportFactory,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use meshcall_core::{IceCandidate, ParticipantId};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// [`TransportFactory`] поверх настоящих WebRTC соединений.
pub struct RtcTransportFactory {
    config: TransportConfig,
}

impl RtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        peer_id: ParticipantId,
        connection_id: ConnectionId,
        tracks: PublishedTracks,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport =
            RtcTransport::new(peer_id, connection_id, &self.config, tracks, events).await?;
        Ok(Arc::new(transport))
    }
}

pub struct RtcTransport {
    pub peer_id: ParticipantId,
    pub connection_id: ConnectionId,
    peer_connection: Arc<RTCPeerConnection>,
    audio_sender: Arc<RTCRtpSender>,
    video_sender: Arc<RTCRtpSender>,
}

impl RtcTransport {
    /// Инициализация нового WebRTC соединения.
    /// event_tx: канал, в который транспорт отдает события главному циклу сессии.
    pub async fn new(
        peer_id: ParticipantId,
        connection_id: ConnectionId,
        config: &TransportConfig,
        tracks: PublishedTracks,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        // 1. Кодеки по умолчанию (opus, VP8, ...)
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        // 2. Интерцепторы (NACK, RTCP отчеты)
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        // 3. STUN/TURN
        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        // 4. Один sendrecv слот на каждый тип медиа, даже если трека еще нет
        let audio_sender =
            Self::add_media_slot(&peer_connection, TrackKind::Audio, tracks.audio.as_ref())
                .await
                .context("Failed to add audio slot")?;
        let video_sender =
            Self::add_media_slot(&peer_connection, TrackKind::Video, tracks.video.as_ref())
                .await
                .context("Failed to add video slot")?;

        // A. Состояние соединения
        let state_tx = event_tx.clone();
        let uid_state = peer_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let uid = uid_state.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {}", uid, s);
                    let state = match s {
                        RTCPeerConnectionState::Connected => LinkState::Connected,
                        RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
                        RTCPeerConnectionState::Failed => LinkState::Failed,
                        RTCPeerConnectionState::Closed => LinkState::Closed,
                        _ => LinkState::Connecting,
                    };
                    let _ = tx
                        .send(TransportEvent::StateChanged(uid, connection_id, state))
                        .await;
                })
            },
        ));

        // B. Trickle ICE: локальные кандидаты уходят через сигнальный канал
        let ice_tx = event_tx.clone();
        let uid_ice = peer_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let uid = uid_ice.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let init = match candidate.to_json() {
                    Ok(init) => init,
                    Err(e) => {
                        warn!("Failed to serialize ICE candidate for {}: {}", uid, e);
                        return;
                    }
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                };
                let _ = tx
                    .send(TransportEvent::CandidateGenerated(uid, connection_id, candidate))
                    .await;
            })
        }));

        // C. Входящие треки удаленного участника
        let track_tx = event_tx;
        let uid_track = peer_id.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let uid = uid_track.clone();

                Box::pin(async move {
                    debug!("Remote {} track '{}' from {}", track.kind(), track.id(), uid);
                    let _ = tx
                        .send(TransportEvent::RemoteTrack(uid, connection_id, track))
                        .await;
                })
            },
        ));

        Ok(Self {
            peer_id,
            connection_id,
            peer_connection,
            audio_sender,
            video_sender,
        })
    }

    async fn add_media_slot(
        peer_connection: &Arc<RTCPeerConnection>,
        kind: TrackKind,
        track: Option<&Arc<LocalTrack>>,
    ) -> Result<Arc<RTCRtpSender>> {
        let sender = match track {
            Some(track) => peer_connection.add_track(track.rtp_track()).await?,
            None => {
                let codec_type = match kind {
                    TrackKind::Audio => RTPCodecType::Audio,
                    TrackKind::Video => RTPCodecType::Video,
                };
                let transceiver = peer_connection
                    .add_transceiver_from_kind(
                        codec_type,
                        Some(RTCRtpTransceiverInit {
                            direction: RTCRtpTransceiverDirection::Sendrecv,
                            send_encodings: vec![],
                        }),
                    )
                    .await?;
                transceiver.sender().await
            }
        };

        // RTCP нужно вычитывать, иначе интерцепторы не работают
        let rtcp_sender = sender.clone();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 1500];
            while rtcp_sender.read(&mut buf).await.is_ok() {}
        });

        Ok(sender)
    }

    fn sender_for(&self, kind: TrackKind) -> &Arc<RTCRtpSender> {
        match kind {
            TrackKind::Audio => &self.audio_sender,
            TrackKind::Video => &self.video_sender,
        }
    }
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        let desc = match description {
            SessionDescription::Offer(sdp) => RTCSessionDescription::offer(sdp)?,
            SessionDescription::Answer(sdp) => RTCSessionDescription::answer(sdp)?,
        };
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn replace_track(&self, track: Arc<LocalTrack>) -> Result<()> {
        self.sender_for(track.kind())
            .replace_track(Some(track.rtp_track()))
            .await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
