use crate::model::chat::ChatContent;
use crate::model::error::ProtocolError;
use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

/// Network candidate in the browser `RTCIceCandidate.toJSON()` shape.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default)]
    pub username_fragment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalPayload {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate { candidate: IceCandidate },
}

impl SignalPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            SignalPayload::Offer { .. } => "offer",
            SignalPayload::Answer { .. } => "answer",
            SignalPayload::Candidate { .. } => "candidate",
        }
    }
}

/// `signal` content. Inbound messages carry `senderId` (stamped by the server),
/// outbound messages carry `targetId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<ParticipantId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<ParticipantId>,
    #[serde(flatten)]
    pub payload: SignalPayload,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<ParticipantId>,
    pub is_host: bool,
    pub is_admitted: bool,
    pub is_waiting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantJoined {
    pub participant_id: ParticipantId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantLeft {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingParticipant {
    pub id: ParticipantId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitingRoomUpdate {
    #[serde(default)]
    pub waiting_participants: Vec<WaitingParticipant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Init,
    ParticipantJoined,
    ParticipantLeft,
    Signal,
    Chat,
    WaitingRoomUpdate,
    Admitted,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Init => "init",
            MessageKind::ParticipantJoined => "participant-joined",
            MessageKind::ParticipantLeft => "participant-left",
            MessageKind::Signal => "signal",
            MessageKind::Chat => "chat",
            MessageKind::WaitingRoomUpdate => "waiting-room-update",
            MessageKind::Admitted => "admitted",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        let kind = match kind {
            "init" => MessageKind::Init,
            "participant-joined" => MessageKind::ParticipantJoined,
            "participant-left" => MessageKind::ParticipantLeft,
            "signal" => MessageKind::Signal,
            "chat" => MessageKind::Chat,
            "waiting-room-update" => MessageKind::WaitingRoomUpdate,
            "admitted" => MessageKind::Admitted,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message on the meeting's signaling socket.
#[derive(Debug, Clone, PartialEq)]
pub enum SignalingMessage {
    Init(InitContent),
    ParticipantJoined(ParticipantJoined),
    ParticipantLeft(ParticipantLeft),
    Signal(SignalContent),
    Chat(ChatContent),
    WaitingRoomUpdate(WaitingRoomUpdate),
    Admitted,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Value,
}

impl SignalingMessage {
    /// Outbound `signal` addressed to `target`.
    pub fn signal(target: ParticipantId, payload: SignalPayload) -> Self {
        SignalingMessage::Signal(SignalContent {
            sender_id: None,
            target_id: Some(target),
            payload,
        })
    }

    pub fn chat(text: impl Into<String>) -> Self {
        SignalingMessage::Chat(ChatContent::outbound(text))
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            SignalingMessage::Init(_) => MessageKind::Init,
            SignalingMessage::ParticipantJoined(_) => MessageKind::ParticipantJoined,
            SignalingMessage::ParticipantLeft(_) => MessageKind::ParticipantLeft,
            SignalingMessage::Signal(_) => MessageKind::Signal,
            SignalingMessage::Chat(_) => MessageKind::Chat,
            SignalingMessage::WaitingRoomUpdate(_) => MessageKind::WaitingRoomUpdate,
            SignalingMessage::Admitted => MessageKind::Admitted,
        }
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
        let kind = MessageKind::parse(&envelope.kind)
            .ok_or_else(|| ProtocolError::UnknownKind(envelope.kind.clone()))?;

        let content = envelope.content;
        let message = match kind {
            MessageKind::Init => SignalingMessage::Init(content_of(kind, content)?),
            MessageKind::ParticipantJoined => {
                SignalingMessage::ParticipantJoined(content_of(kind, content)?)
            }
            MessageKind::ParticipantLeft => {
                SignalingMessage::ParticipantLeft(content_of(kind, content)?)
            }
            MessageKind::Signal => SignalingMessage::Signal(content_of(kind, content)?),
            MessageKind::Chat => SignalingMessage::Chat(content_of(kind, content)?),
            MessageKind::WaitingRoomUpdate => {
                SignalingMessage::WaitingRoomUpdate(content_of(kind, content)?)
            }
            MessageKind::Admitted => SignalingMessage::Admitted,
        };
        Ok(message)
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        let content = match self {
            SignalingMessage::Init(c) => serde_json::to_value(c),
            SignalingMessage::ParticipantJoined(c) => serde_json::to_value(c),
            SignalingMessage::ParticipantLeft(c) => serde_json::to_value(c),
            SignalingMessage::Signal(c) => serde_json::to_value(c),
            SignalingMessage::Chat(c) => serde_json::to_value(c),
            SignalingMessage::WaitingRoomUpdate(c) => serde_json::to_value(c),
            SignalingMessage::Admitted => Ok(Value::Object(Default::default())),
        }
        .map_err(ProtocolError::Encode)?;

        let envelope = Envelope {
            kind: self.kind().as_str().to_owned(),
            content,
        };
        serde_json::to_string(&envelope).map_err(ProtocolError::Encode)
    }
}

fn content_of<T: serde::de::DeserializeOwned>(
    kind: MessageKind,
    content: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(content).map_err(|source| ProtocolError::MalformedContent {
        kind: kind.as_str(),
        source,
    })
}
