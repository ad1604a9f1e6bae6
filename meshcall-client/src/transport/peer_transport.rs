use crate::media::{LocalTrack, PublishedTracks};
use crate::transport::TransportEvent;
use anyhow::Result;
use async_trait::async_trait;
use meshcall_core::{IceCandidate, ParticipantId};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of one underlying peer connection. A participant can go through
/// several of these (glare rebuild, rejoin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionDescription {
    Offer(String),
    Answer(String),
}

/// One media-carrying connection to one remote participant.
///
/// `create_offer` and `create_answer` also install the result as the local
/// description before returning it.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<String>;

    async fn create_answer(&self) -> Result<String>;

    async fn set_remote_description(&self, description: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Swap the outgoing track of the same kind without renegotiating.
    async fn replace_track(&self, track: Arc<LocalTrack>) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Builds transports with one send/receive slot per media kind, filled from
/// `tracks` where a track is available.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        peer_id: ParticipantId,
        connection_id: ConnectionId,
        tracks: PublishedTracks,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>>;
}
