use crate::media::MediaHandle;
use crate::signaling::SignalingOutput;
use crate::transport::{TransportEvent, TransportFactory};
use meshcall_core::ParticipantId;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a negotiation needs from the rest of the client.
#[derive(Clone)]
pub struct NegotiationContext {
    pub local_id: ParticipantId,
    pub transports: Arc<dyn TransportFactory>,
    pub signaling: Arc<dyn SignalingOutput>,
    pub media: MediaHandle,
    pub transport_events: mpsc::Sender<TransportEvent>,
}

impl NegotiationContext {
    pub fn new(
        local_id: ParticipantId,
        transports: Arc<dyn TransportFactory>,
        signaling: Arc<dyn SignalingOutput>,
        media: MediaHandle,
        transport_events: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            local_id,
            transports,
            signaling,
            media,
            transport_events,
        }
    }
}
