use crate::error::SessionEnded;
use crate::session::SessionCommand;
use tokio::sync::mpsc;

/// Cloneable remote control for a running [`crate::CallSession`].
#[derive(Debug, Clone)]
pub struct CallHandle {
    tx: mpsc::Sender<SessionCommand>,
}

impl CallHandle {
    pub(crate) fn new(tx: mpsc::Sender<SessionCommand>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, command: SessionCommand) -> Result<(), SessionEnded> {
        self.tx.send(command).await.map_err(|_| SessionEnded)
    }

    pub async fn start_media(&self) -> Result<(), SessionEnded> {
        self.send(SessionCommand::StartMedia).await
    }

    pub async fn toggle_audio(&self) -> Result<(), SessionEnded> {
        self.send(SessionCommand::ToggleAudio).await
    }

    pub async fn toggle_video(&self) -> Result<(), SessionEnded> {
        self.send(SessionCommand::ToggleVideo).await
    }

    pub async fn start_screen_share(&self) -> Result<(), SessionEnded> {
        self.send(SessionCommand::StartScreenShare).await
    }

    pub async fn stop_screen_share(&self) -> Result<(), SessionEnded> {
        self.send(SessionCommand::StopScreenShare).await
    }

    /// Whitespace is trimmed; empty messages are not sent.
    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), SessionEnded> {
        self.send(SessionCommand::SendChat(text.into())).await
    }

    pub async fn hangup(&self) -> Result<(), SessionEnded> {
        self.send(SessionCommand::Hangup).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
