use crate::error::NegotiationError;
use crate::media::{LocalTrack, PublishedTracks, TrackKind};
use crate::negotiation::{NegotiationContext, NegotiationState};
use crate::transport::{ConnectionId, PeerTransport, SessionDescription};
use meshcall_core::{IceCandidate, ParticipantId};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct SentTracks {
    audio: Option<String>,
    video: Option<String>,
}

impl SentTracks {
    fn slot(&mut self, kind: TrackKind) -> &mut Option<String> {
        match kind {
            TrackKind::Audio => &mut self.audio,
            TrackKind::Video => &mut self.video,
        }
    }

    fn record(&mut self, tracks: &PublishedTracks) {
        self.audio = tracks.audio.as_ref().map(|t| t.id().to_owned());
        self.video = tracks.video.as_ref().map(|t| t.id().to_owned());
    }
}

/// Offer/answer exchange with a single remote participant.
///
/// Remote candidates that arrive before any remote description are queued and
/// applied in arrival order once one is set. Offer collisions are settled by
/// comparing participant ids: the side with the smaller id drops its own offer
/// and answers the remote one, the other side ignores the remote offer.
pub struct NegotiationStateMachine {
    remote_id: ParticipantId,
    connection_id: ConnectionId,
    ctx: NegotiationContext,
    transport: Option<Arc<dyn PeerTransport>>,
    state: NegotiationState,
    remote_description_set: bool,
    pending_candidates: VecDeque<IceCandidate>,
    sent: SentTracks,
}

impl NegotiationStateMachine {
    pub fn new(remote_id: ParticipantId, ctx: NegotiationContext) -> Self {
        Self {
            remote_id,
            connection_id: ConnectionId::new(),
            ctx,
            transport: None,
            state: NegotiationState::New,
            remote_description_set: false,
            pending_candidates: VecDeque::new(),
            sent: SentTracks::default(),
        }
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.remote_id
    }

    /// Id of the live connection. Changes when the connection is rebuilt.
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set
    }

    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn sent_track_id(&self, kind: TrackKind) -> Option<&str> {
        match kind {
            TrackKind::Audio => self.sent.audio.as_deref(),
            TrackKind::Video => self.sent.video.as_deref(),
        }
    }

    /// Create and send an offer. A second call while the first offer is
    /// outstanding is a no-op.
    pub async fn create_as_initiator(&mut self) -> Result<(), NegotiationError> {
        match self.state {
            NegotiationState::New => {}
            NegotiationState::HaveLocalOffer => {
                debug!("Offer to {} already outstanding", self.remote_id);
                return Ok(());
            }
            state => {
                return Err(NegotiationError::InvalidState {
                    operation: "create offer",
                    state,
                });
            }
        }

        let transport = self.ensure_transport().await?;
        let sdp = match transport.create_offer().await {
            Ok(sdp) => sdp,
            Err(e) => return Err(self.fail("create offer", e)),
        };

        self.state = NegotiationState::HaveLocalOffer;
        info!("Sending offer to {}", self.remote_id);
        self.ctx
            .signaling
            .send_offer(self.remote_id.clone(), sdp)
            .await;
        Ok(())
    }

    pub async fn handle_remote_offer(&mut self, sdp: String) -> Result<(), NegotiationError> {
        match self.state {
            NegotiationState::New | NegotiationState::Stable => {}
            NegotiationState::HaveLocalOffer => {
                if self.ctx.local_id < self.remote_id {
                    info!(
                        "Offer collision with {}: yielding, answering remote offer",
                        self.remote_id
                    );
                    self.discard_connection().await;
                } else {
                    info!(
                        "Offer collision with {}: keeping local offer, ignoring remote",
                        self.remote_id
                    );
                    return Ok(());
                }
            }
            state => {
                return Err(NegotiationError::InvalidState {
                    operation: "accept offer",
                    state,
                });
            }
        }

        self.state = NegotiationState::HaveRemoteOffer;
        let transport = self.ensure_transport().await?;

        if let Err(e) = transport
            .set_remote_description(SessionDescription::Offer(sdp))
            .await
        {
            return Err(self.fail("apply remote offer", e));
        }
        self.remote_description_set = true;

        let answer = match transport.create_answer().await {
            Ok(answer) => answer,
            Err(e) => return Err(self.fail("create answer", e)),
        };

        self.state = NegotiationState::Stable;
        info!("Sending answer to {}", self.remote_id);
        self.ctx
            .signaling
            .send_answer(self.remote_id.clone(), answer)
            .await;

        self.flush_candidates(&transport).await?;
        self.sync_tracks(&transport).await
    }

    /// Only meaningful while our offer is outstanding; otherwise ignored.
    pub async fn handle_remote_answer(&mut self, sdp: String) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::HaveLocalOffer {
            debug!(
                "Ignoring answer from {} in state {}",
                self.remote_id, self.state
            );
            return Ok(());
        }
        let Some(transport) = self.transport.clone() else {
            return Ok(());
        };

        if let Err(e) = transport
            .set_remote_description(SessionDescription::Answer(sdp))
            .await
        {
            return Err(self.fail("apply remote answer", e));
        }
        self.remote_description_set = true;
        self.state = NegotiationState::Stable;
        info!("Negotiation with {} complete", self.remote_id);

        self.flush_candidates(&transport).await?;
        self.sync_tracks(&transport).await
    }

    pub async fn handle_remote_candidate(
        &mut self,
        candidate: IceCandidate,
    ) -> Result<(), NegotiationError> {
        if self.state.is_terminal() {
            debug!("Dropping candidate from {} ({})", self.remote_id, self.state);
            return Ok(());
        }

        match self.transport.clone() {
            Some(transport) if self.remote_description_set => {
                if let Err(e) = transport.add_ice_candidate(candidate).await {
                    return Err(self.fail("add candidate", e));
                }
            }
            _ => {
                self.pending_candidates.push_back(candidate);
                debug!(
                    "Queued candidate from {} ({} pending)",
                    self.remote_id,
                    self.pending_candidates.len()
                );
            }
        }
        Ok(())
    }

    /// Swap the outgoing track of the same kind. No new offer/answer round.
    pub async fn renegotiate_track(
        &mut self,
        track: Arc<LocalTrack>,
    ) -> Result<(), NegotiationError> {
        if self.state != NegotiationState::Stable {
            return Err(NegotiationError::InvalidState {
                operation: "replace track",
                state: self.state,
            });
        }
        let Some(transport) = self.transport.clone() else {
            return Ok(());
        };

        if let Err(e) = transport.replace_track(track.clone()).await {
            return Err(self.fail("replace track", e));
        }
        *self.sent.slot(track.kind()) = Some(track.id().to_owned());
        debug!("Replaced {} track for {}", track.kind(), self.remote_id);
        Ok(())
    }

    /// Release the connection. Calling it again does nothing.
    pub async fn close(&mut self) {
        if self.state == NegotiationState::Closed {
            return;
        }
        if let Some(transport) = self.transport.take()
            && let Err(e) = transport.close().await
        {
            warn!("Error closing connection to {}: {:#}", self.remote_id, e);
        }
        self.pending_candidates.clear();
        self.state = NegotiationState::Closed;
        info!("Connection to {} closed", self.remote_id);
    }

    async fn ensure_transport(&mut self) -> Result<Arc<dyn PeerTransport>, NegotiationError> {
        if let Some(transport) = &self.transport {
            return Ok(transport.clone());
        }

        let tracks = self.ctx.media.published().await;
        let created = self
            .ctx
            .transports
            .create(
                self.remote_id.clone(),
                self.connection_id,
                tracks.clone(),
                self.ctx.transport_events.clone(),
            )
            .await;

        match created {
            Ok(transport) => {
                self.sent.record(&tracks);
                self.transport = Some(transport.clone());
                Ok(transport)
            }
            Err(e) => Err(self.fail("create connection", e)),
        }
    }

    /// Throw away our side of a collided offer and start from a fresh
    /// connection. Queued remote candidates belong to the remote side and stay.
    async fn discard_connection(&mut self) {
        if let Some(transport) = self.transport.take()
            && let Err(e) = transport.close().await
        {
            warn!("Error closing collided connection to {}: {:#}", self.remote_id, e);
        }
        self.connection_id = ConnectionId::new();
        self.remote_description_set = false;
        self.sent = SentTracks::default();
        self.state = NegotiationState::New;
    }

    async fn flush_candidates(
        &mut self,
        transport: &Arc<dyn PeerTransport>,
    ) -> Result<(), NegotiationError> {
        while let Some(candidate) = self.pending_candidates.pop_front() {
            if let Err(e) = transport.add_ice_candidate(candidate).await {
                return Err(self.fail("add queued candidate", e));
            }
        }
        Ok(())
    }

    /// Local media may have changed while this negotiation was in flight.
    async fn sync_tracks(
        &mut self,
        transport: &Arc<dyn PeerTransport>,
    ) -> Result<(), NegotiationError> {
        let published = self.ctx.media.published().await;
        for kind in [TrackKind::Audio, TrackKind::Video] {
            let Some(track) = published.of_kind(kind) else {
                continue;
            };
            if self.sent_track_id(kind) == Some(track.id()) {
                continue;
            }
            if let Err(e) = transport.replace_track(track.clone()).await {
                return Err(self.fail("replace track", e));
            }
            *self.sent.slot(kind) = Some(track.id().to_owned());
            debug!("Synced {} track for {}", kind, self.remote_id);
        }
        Ok(())
    }

    fn fail(&mut self, operation: &'static str, source: anyhow::Error) -> NegotiationError {
        warn!(
            "Negotiation with {} failed during {}: {:#}",
            self.remote_id, operation, source
        );
        self.state = NegotiationState::Failed;
        NegotiationError::Transport { operation, source }
    }
}
