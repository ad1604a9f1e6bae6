use crate::config::ClientConfig;
use crate::error::SignalingError;
use crate::signaling::{Connector, SignalingOutput, WireSink, WireStream};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use meshcall_core::utils::DEFAULT_DISPLAY_NAME;
use meshcall_core::{ParticipantId, SignalingMessage};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
}

pub type MessageHandler = Arc<dyn Fn(SignalingMessage) + Send + Sync>;

struct ChannelShared {
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    handler: Mutex<Option<MessageHandler>>,
    state: watch::Sender<ChannelState>,
}

impl ChannelShared {
    fn set_state(&self, state: ChannelState) {
        self.state.send_replace(state);
    }

    async fn dispatch(&self, text: &str) {
        let message = match SignalingMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring signaling message: {}", e);
                return;
            }
        };
        debug!("Received '{}' message", message.kind());

        let handler = self.handler.lock().await.clone();
        match handler {
            Some(handler) => handler(message),
            None => warn!("No handler registered, dropping '{}' message", message.kind()),
        }
    }
}

/// Persistent message channel to the signaling server for one meeting.
///
/// After `connect` the channel keeps itself open: when the connection drops
/// it waits `reconnect_delay` and dials again, without limit, until
/// [`SignalingChannel::close`] is called. Inbound messages are handed to the
/// registered handler in arrival order. Sending while no connection is open
/// drops the message with a warning.
pub struct SignalingChannel {
    server_url: String,
    reconnect_delay: Duration,
    connector: Arc<dyn Connector>,
    shared: Arc<ChannelShared>,
    cancel: CancellationToken,
}

impl SignalingChannel {
    pub fn new(config: &ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(ChannelState::Idle);
        Self {
            server_url: config.server_url.clone(),
            reconnect_delay: config.reconnect_delay(),
            connector,
            shared: Arc::new(ChannelShared {
                outbound: Mutex::new(None),
                handler: Mutex::new(None),
                state,
            }),
            cancel: CancellationToken::new(),
        }
    }

    /// Register the inbound handler, replacing any previous one.
    pub async fn on_message(&self, handler: MessageHandler) {
        *self.shared.handler.lock().await = Some(handler);
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Start the connection loop. Fails only if the endpoint cannot be built.
    pub fn connect(
        &self,
        meeting_code: &str,
        participant_id: &ParticipantId,
        display_name: &str,
    ) -> Result<JoinHandle<()>, SignalingError> {
        let url = endpoint(&self.server_url, meeting_code, participant_id, display_name)?;
        info!(%url, "Connecting to signaling server");

        let connector = self.connector.clone();
        let shared = self.shared.clone();
        let cancel = self.cancel.clone();
        let delay = self.reconnect_delay;

        Ok(tokio::spawn(async move {
            run_connection_loop(url, connector, shared, delay, cancel).await;
        }))
    }

    /// Stop the channel for good; no reconnect follows.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl SignalingOutput for SignalingChannel {
    async fn send(&self, message: SignalingMessage) {
        let kind = message.kind();
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                error!("Failed to encode '{}' message: {}", kind, e);
                return;
            }
        };

        let queued = match self.shared.outbound.lock().await.as_ref() {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        };
        if queued {
            debug!("Queued '{}' message", kind);
        } else {
            warn!("Signaling channel not open, dropping '{}' message", kind);
        }
    }
}

/// `{server}/ws/{meeting}/{participant}?name={name}`
pub fn endpoint(
    server_url: &str,
    meeting_code: &str,
    participant_id: &ParticipantId,
    display_name: &str,
) -> Result<Url, SignalingError> {
    let mut url =
        Url::parse(server_url).map_err(|e| SignalingError::InvalidUrl(e.to_string()))?;

    url.path_segments_mut()
        .map_err(|_| SignalingError::InvalidUrl(format!("{} cannot be a base", server_url)))?
        .pop_if_empty()
        .extend(["ws", meeting_code, participant_id.as_str()]);

    let name = match display_name.trim() {
        "" => DEFAULT_DISPLAY_NAME,
        name => name,
    };
    url.query_pairs_mut().clear().append_pair("name", name);
    Ok(url)
}

async fn run_connection_loop(
    url: Url,
    connector: Arc<dyn Connector>,
    shared: Arc<ChannelShared>,
    delay: Duration,
    cancel: CancellationToken,
) {
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        shared.set_state(if attempt == 1 {
            ChannelState::Connecting
        } else {
            ChannelState::Reconnecting
        });

        let opened = tokio::select! {
            _ = cancel.cancelled() => break,
            result = connector.connect(&url) => result,
        };

        match opened {
            Ok((sink, stream)) => {
                info!(attempt, "Signaling channel open");
                pump(sink, stream, &shared, &cancel).await;
                shared.outbound.lock().await.take();

                if cancel.is_cancelled() {
                    break;
                }
                warn!("Signaling channel closed, reconnecting in {:?}", delay);
            }
            Err(e) => error!("Signaling connect attempt {} failed: {}", attempt, e),
        }

        shared.set_state(ChannelState::Reconnecting);
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.outbound.lock().await.take();
    shared.set_state(ChannelState::Closed);
    info!("Signaling channel stopped");
}

async fn pump(
    mut sink: WireSink,
    mut stream: WireStream,
    shared: &ChannelShared,
    cancel: &CancellationToken,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    *shared.outbound.lock().await = Some(tx);
    shared.set_state(ChannelState::Open);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                break;
            }

            Some(text) = rx.recv() => {
                if let Err(e) = sink.send(text).await {
                    error!("Failed to send signaling message: {}", e);
                    break;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(text)) => shared.dispatch(&text).await,
                    Some(Err(SignalingError::Closed)) | None => {
                        info!("Signaling connection closed by server");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("Signaling connection error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}
