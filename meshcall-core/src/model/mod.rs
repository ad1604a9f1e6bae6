mod chat;
mod error;
mod participant;
mod signaling;

pub use chat::ChatContent;
pub use error::ProtocolError;
pub use participant::ParticipantId;
pub use signaling::{
    IceCandidate, IceServerConfig, InitContent, MessageKind, ParticipantJoined, ParticipantLeft,
    SignalContent, SignalPayload, SignalingMessage, WaitingParticipant, WaitingRoomUpdate,
};
