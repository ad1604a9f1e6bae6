use crate::negotiation::NegotiationState;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SignalingError {
    #[error("invalid signaling url: {0}")]
    InvalidUrl(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("connection closed by server")]
    Closed,

    #[error("websocket error: {0}")]
    Transport(String),
}

/// Capture failures. Reported to the user, never retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("device unavailable: {0}")]
    Unavailable(String),

    #[error("local media has not been started")]
    NotStarted,
}

#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("'{operation}' is not valid in state {state}")]
    InvalidState {
        operation: &'static str,
        state: NegotiationState,
    },

    #[error("{operation} failed: {source:#}")]
    Transport {
        operation: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl NegotiationError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, NegotiationError::InvalidState { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("call session has ended")]
pub struct SessionEnded;
