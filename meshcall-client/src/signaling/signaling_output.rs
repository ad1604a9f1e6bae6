use async_trait::async_trait;
use meshcall_core::{IceCandidate, ParticipantId, SignalPayload, SignalingMessage};

/// Outbound side of the signaling channel.
///
/// Delivery is best-effort: implementations drop messages they cannot send
/// right now instead of returning an error.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    async fn send(&self, message: SignalingMessage);

    async fn send_offer(&self, target: ParticipantId, sdp: String) {
        self.send(SignalingMessage::signal(target, SignalPayload::Offer { sdp }))
            .await;
    }

    async fn send_answer(&self, target: ParticipantId, sdp: String) {
        self.send(SignalingMessage::signal(target, SignalPayload::Answer { sdp }))
            .await;
    }

    /// Trickle one local candidate to `target`.
    async fn send_ice(&self, target: ParticipantId, candidate: IceCandidate) {
        self.send(SignalingMessage::signal(
            target,
            SignalPayload::Candidate { candidate },
        ))
        .await;
    }
}
