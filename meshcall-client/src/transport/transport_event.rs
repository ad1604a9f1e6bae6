use crate::transport::ConnectionId;
use meshcall_core::{IceCandidate, ParticipantId};
use std::fmt;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Coarse link state of one peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Disconnected => "disconnected",
            LinkState::Failed => "failed",
            LinkState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// What a peer connection reports back to the session loop.
///
/// Every event carries the id of the connection that produced it so events
/// from a discarded connection can be told apart from the live one.
pub enum TransportEvent {
    CandidateGenerated(ParticipantId, ConnectionId, IceCandidate),
    StateChanged(ParticipantId, ConnectionId, LinkState),
    RemoteTrack(ParticipantId, ConnectionId, Arc<TrackRemote>),
}

impl TransportEvent {
    pub fn source(&self) -> (&ParticipantId, ConnectionId) {
        match self {
            TransportEvent::CandidateGenerated(peer, conn, _)
            | TransportEvent::StateChanged(peer, conn, _)
            | TransportEvent::RemoteTrack(peer, conn, _) => (peer, *conn),
        }
    }
}
