use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("unknown message kind '{0}'")]
    UnknownKind(String),

    #[error("malformed '{kind}' content: {source}")]
    MalformedContent {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}
