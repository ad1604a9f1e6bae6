/// User intents fed into the session loop by [`crate::CallHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Retry capture after a device error. Ignored until admitted.
    StartMedia,
    ToggleAudio,
    ToggleVideo,
    StartScreenShare,
    StopScreenShare,
    SendChat(String),
    Hangup,
}
