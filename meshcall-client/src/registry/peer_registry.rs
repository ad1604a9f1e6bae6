use crate::error::NegotiationError;
use crate::media::{FanoutReport, LocalTrack, TrackFanout};
use crate::negotiation::{NegotiationContext, NegotiationState, NegotiationStateMachine};
use crate::registry::ConnectionEntry;
use crate::session::CallEvent;
use crate::transport::{ConnectionId, LinkState, TransportEvent};
use async_trait::async_trait;
use futures::future::join_all;
use meshcall_core::{ParticipantId, SignalContent, SignalPayload};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// All peer connections of the local participant, keyed by remote identity.
///
/// Entries are created on `participant-joined` (we offer) or on the first
/// signal from an unseen sender (we answer), and removed on
/// `participant-left`. A participant that leaves and comes back always gets a
/// fresh entry.
pub struct PeerConnectionRegistry {
    ctx: NegotiationContext,
    entries: HashMap<ParticipantId, ConnectionEntry>,
    events: mpsc::UnboundedSender<CallEvent>,
}

impl PeerConnectionRegistry {
    pub fn new(ctx: NegotiationContext, events: mpsc::UnboundedSender<CallEvent>) -> Self {
        Self {
            ctx,
            entries: HashMap::new(),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&ConnectionEntry> {
        self.entries.get(id)
    }

    pub fn state_of(&self, id: &ParticipantId) -> Option<NegotiationState> {
        self.entries.get(id).map(ConnectionEntry::state)
    }

    pub fn is_initiator(&self, id: &ParticipantId) -> Option<bool> {
        self.entries.get(id).map(|entry| entry.initiator)
    }

    pub fn connection_id_of(&self, id: &ParticipantId) -> Option<ConnectionId> {
        self.entries.get(id).map(|entry| entry.machine.connection_id())
    }

    /// Participants with an entry, sorted.
    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<_> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// A newcomer joined: we are the side that offers.
    pub async fn participant_joined(&mut self, id: ParticipantId, name: String) {
        if id == self.ctx.local_id {
            debug!("Ignoring join notice for ourselves");
            return;
        }
        let _ = self.events.send(CallEvent::ParticipantJoined {
            participant_id: id.clone(),
            name: name.clone(),
        });

        match self.state_of(&id) {
            Some(state) if state.is_terminal() => {
                info!("Replacing {} entry for {}", state, id);
                self.entries.remove(&id);
            }
            Some(NegotiationState::New) => {}
            Some(state) => {
                debug!("Already negotiating with {} ({}), ignoring join", id, state);
                return;
            }
            None => {}
        }

        info!("Participant {} ({}) joined, creating offer", id, name);
        let ctx = self.ctx.clone();
        let entry = self.entries.entry(id.clone()).or_insert_with(|| {
            ConnectionEntry::new(NegotiationStateMachine::new(id.clone(), ctx), true, None)
        });
        entry.initiator = true;
        entry.display_name = Some(name);

        if let Err(e) = entry.machine.create_as_initiator().await {
            self.report_failure(&id, e);
        }
    }

    pub async fn participant_left(&mut self, id: &ParticipantId) {
        match self.entries.remove(id) {
            Some(mut entry) => {
                info!("Participant {} left", id);
                entry.machine.close().await;
            }
            None => debug!("Participant {} left without a connection", id),
        }
        let _ = self.events.send(CallEvent::ParticipantLeft {
            participant_id: id.clone(),
        });
    }

    /// Route an inbound `signal` to the sender's negotiation.
    pub async fn handle_signal(&mut self, content: SignalContent) {
        let Some(sender) = content.sender_id else {
            warn!("Dropping '{}' signal without sender", content.payload.type_name());
            return;
        };
        if sender == self.ctx.local_id {
            debug!("Dropping signal echoed back to ourselves");
            return;
        }
        let payload = content.payload;

        // A failed connection can be retried by the remote side with a new offer.
        let needs_entry = match self.state_of(&sender) {
            None => true,
            Some(state) => state.is_terminal() && matches!(payload, SignalPayload::Offer { .. }),
        };
        if needs_entry {
            if let Some(mut stale) = self.entries.remove(&sender) {
                stale.machine.close().await;
            }
            info!("First signal from {}, creating connection entry", sender);
            let machine = NegotiationStateMachine::new(sender.clone(), self.ctx.clone());
            self.entries
                .insert(sender.clone(), ConnectionEntry::new(machine, false, None));
        }

        let Some(entry) = self.entries.get_mut(&sender) else {
            return;
        };
        let result = match payload {
            SignalPayload::Offer { sdp } => entry.machine.handle_remote_offer(sdp).await,
            SignalPayload::Answer { sdp } => entry.machine.handle_remote_answer(sdp).await,
            SignalPayload::Candidate { candidate } => {
                entry.machine.handle_remote_candidate(candidate).await
            }
        };

        if let Err(e) = result {
            self.report_failure(&sender, e);
        }
    }

    /// Events from a connection that has since been replaced or closed are dropped.
    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        let (peer, connection_id) = event.source();
        let is_current = self
            .entries
            .get(peer)
            .is_some_and(|entry| entry.is_live() && entry.machine.connection_id() == connection_id);
        if !is_current {
            debug!("Dropping event from stale connection {} to {}", connection_id, peer);
            return;
        }

        match event {
            TransportEvent::CandidateGenerated(peer, _, candidate) => {
                self.ctx.signaling.send_ice(peer, candidate).await;
            }
            TransportEvent::StateChanged(peer, _, LinkState::Connected) => {
                info!("Media connection to {} established", peer);
                let _ = self.events.send(CallEvent::PeerConnected(peer));
            }
            TransportEvent::StateChanged(
                peer,
                _,
                state @ (LinkState::Disconnected | LinkState::Failed | LinkState::Closed),
            ) => {
                info!("Media connection to {} is {}", peer, state);
                let _ = self.events.send(CallEvent::PeerDisconnected(peer));
            }
            TransportEvent::StateChanged(_, _, LinkState::Connecting) => {}
            TransportEvent::RemoteTrack(peer, _, track) => {
                let _ = self.events.send(CallEvent::RemoteTrack {
                    participant_id: peer,
                    track,
                });
            }
        }
    }

    /// Close every connection. Used on hangup.
    pub async fn close_all(&mut self) {
        let closing = self
            .entries
            .values_mut()
            .map(|entry| entry.machine.close());
        join_all(closing).await;
        self.entries.clear();
    }

    fn report_failure(&self, id: &ParticipantId, error: NegotiationError) {
        if error.is_rejection() {
            debug!("Signal from {} rejected: {}", id, error);
            return;
        }
        warn!("Negotiation with {} failed: {}", id, error);
        let _ = self.events.send(CallEvent::NegotiationFailed {
            participant_id: id.clone(),
            reason: error.to_string(),
        });
    }
}

#[async_trait]
impl TrackFanout for PeerConnectionRegistry {
    /// Stable entries swap the track now; entries still negotiating pick it up
    /// when they reach stable. Failed and closed entries are left out.
    async fn replace_track(&mut self, track: Arc<LocalTrack>) -> FanoutReport {
        let mut report = FanoutReport::default();
        let mut targets = Vec::new();

        for (id, entry) in self.entries.iter_mut() {
            match entry.state() {
                NegotiationState::Stable => targets.push((id.clone(), entry)),
                state if state.is_terminal() => {}
                _ => report.deferred.push(id.clone()),
            }
        }

        let results = join_all(targets.into_iter().map(|(id, entry)| {
            let track = track.clone();
            async move {
                let result = entry.machine.renegotiate_track(track).await;
                (id, result)
            }
        }))
        .await;

        for (id, result) in results {
            match result {
                Ok(()) => report.replaced.push(id),
                Err(e) => {
                    report.failed.push((id.clone(), e.to_string()));
                    self.report_failure(&id, e);
                }
            }
        }

        report.replaced.sort();
        report.deferred.sort();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        info!(
            track = track.id(),
            replaced = report.replaced.len(),
            deferred = report.deferred.len(),
            failed = report.failed.len(),
            "Track fan-out complete"
        );
        report
    }
}
