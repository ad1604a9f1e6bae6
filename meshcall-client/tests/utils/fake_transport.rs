use anyhow::{Result, bail};
use async_trait::async_trait;
use meshcall_client::{
    ConnectionId, LinkState, LocalTrack, PeerTransport, PublishedTracks, SessionDescription,
    TransportEvent, TransportFactory,
};
use meshcall_core::{IceCandidate, ParticipantId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One recorded call on a [`FakeTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    CreateOffer,
    CreateAnswer,
    SetRemote(SessionDescription),
    AddCandidate(String),
    ReplaceTrack(String),
    Close,
}

/// Operation a fake transport should fail on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateOffer,
    CreateAnswer,
    SetRemote,
    AddCandidate,
    ReplaceTrack,
}

/// In-memory peer connection that records what the negotiation asked of it.
pub struct FakeTransport {
    pub peer_id: ParticipantId,
    pub connection_id: ConnectionId,
    /// Track ids the connection was created with.
    pub initial_tracks: Vec<String>,
    fail_on: Option<FailPoint>,
    calls: Mutex<Vec<TransportCall>>,
    events: mpsc::Sender<TransportEvent>,
}

impl FakeTransport {
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn was_closed(&self) -> bool {
        self.calls().contains(&TransportCall::Close)
    }

    pub fn applied_candidates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::AddCandidate(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    pub fn replaced_tracks(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::ReplaceTrack(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub async fn emit_state(&self, state: LinkState) {
        let _ = self
            .events
            .send(TransportEvent::StateChanged(
                self.peer_id.clone(),
                self.connection_id,
                state,
            ))
            .await;
    }

    pub async fn emit_candidate(&self, candidate: &str) {
        let _ = self
            .events
            .send(TransportEvent::CandidateGenerated(
                self.peer_id.clone(),
                self.connection_id,
                candidate_line(candidate),
            ))
            .await;
    }

    fn record(&self, call: TransportCall, point: Option<FailPoint>) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if point.is_some() && point == self.fail_on {
            bail!("injected {:?} failure", self.fail_on);
        }
        Ok(())
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn create_offer(&self) -> Result<String> {
        self.record(TransportCall::CreateOffer, Some(FailPoint::CreateOffer))?;
        Ok(format!("offer:{}", self.connection_id))
    }

    async fn create_answer(&self) -> Result<String> {
        self.record(TransportCall::CreateAnswer, Some(FailPoint::CreateAnswer))?;
        Ok(format!("answer:{}", self.connection_id))
    }

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()> {
        self.record(TransportCall::SetRemote(description), Some(FailPoint::SetRemote))
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record(
            TransportCall::AddCandidate(candidate.candidate),
            Some(FailPoint::AddCandidate),
        )
    }

    async fn replace_track(&self, track: Arc<LocalTrack>) -> Result<()> {
        self.record(
            TransportCall::ReplaceTrack(track.id().to_owned()),
            Some(FailPoint::ReplaceTrack),
        )
    }

    async fn close(&self) -> Result<()> {
        self.record(TransportCall::Close, None)
    }
}

/// Factory handing out [`FakeTransport`]s and keeping every one it made.
#[derive(Default)]
pub struct FakeTransportFactory {
    created: Mutex<Vec<Arc<FakeTransport>>>,
    failures: Mutex<HashMap<ParticipantId, FailPoint>>,
    refuse: Mutex<HashSet<ParticipantId>>,
}

impl FakeTransportFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Transports created for `peer` from now on fail at `point`.
    pub fn fail_for(&self, peer: &ParticipantId, point: FailPoint) {
        self.failures.lock().unwrap().insert(peer.clone(), point);
    }

    pub fn heal(&self, peer: &ParticipantId) {
        self.failures.lock().unwrap().remove(peer);
        self.refuse.lock().unwrap().remove(peer);
    }

    /// Creating a transport for `peer` fails outright.
    pub fn refuse_for(&self, peer: &ParticipantId) {
        self.refuse.lock().unwrap().insert(peer.clone());
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn transports_for(&self, peer: &ParticipantId) -> Vec<Arc<FakeTransport>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|t| &t.peer_id == peer)
            .cloned()
            .collect()
    }

    pub fn latest_for(&self, peer: &ParticipantId) -> Option<Arc<FakeTransport>> {
        self.transports_for(peer).pop()
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn create(
        &self,
        peer_id: ParticipantId,
        connection_id: ConnectionId,
        tracks: PublishedTracks,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        if self.refuse.lock().unwrap().contains(&peer_id) {
            bail!("no connection for {}", peer_id);
        }
        let fail_on = self.failures.lock().unwrap().get(&peer_id).copied();
        let transport = Arc::new(FakeTransport {
            peer_id,
            connection_id,
            initial_tracks: tracks.iter().map(|t| t.id().to_owned()).collect(),
            fail_on,
            calls: Mutex::new(Vec::new()),
            events,
        });
        self.created.lock().unwrap().push(transport.clone());
        Ok(transport)
    }
}

/// Candidate in the browser JSON shape with only the SDP line set.
pub fn candidate_line(candidate: &str) -> IceCandidate {
    IceCandidate {
        candidate: candidate.to_owned(),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
        username_fragment: None,
    }
}
