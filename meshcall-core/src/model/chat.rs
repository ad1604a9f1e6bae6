use crate::model::participant::ParticipantId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Chat payload. The client never interprets it beyond trimming outbound text;
/// the server stamps `sender`, `senderId` and `timestamp` (unix seconds) on fan-out.
///
/// Inbound chat is passed through as received: a missing `text` decodes as
/// empty, `timestamp` keeps whatever number the server sent, and fields this
/// client does not know about are kept in `extra` and written back on encode.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<ParticipantId>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Number>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatContent {
    pub fn outbound(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Whole unix seconds; fractional stamps are truncated.
    pub fn timestamp_secs(&self) -> Option<i64> {
        let timestamp = self.timestamp.as_ref()?;
        timestamp
            .as_i64()
            .or_else(|| timestamp.as_f64().map(|secs| secs.trunc() as i64))
    }
}
