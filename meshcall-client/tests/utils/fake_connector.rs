use async_trait::async_trait;
use futures::channel::mpsc as wire;
use futures::{FutureExt, SinkExt, StreamExt};
use meshcall_client::{Connector, SignalingError, WireSink, WireStream};
use meshcall_core::SignalingMessage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use url::Url;

/// Server end of one fake signaling connection.
pub struct ServerConnection {
    pub url: Url,
    to_client: wire::UnboundedSender<Result<String, SignalingError>>,
    from_client: wire::UnboundedReceiver<String>,
}

impl ServerConnection {
    pub fn push(&self, message: &SignalingMessage) {
        self.push_raw(&message.encode().unwrap());
    }

    pub fn push_raw(&self, text: &str) {
        let _ = self.to_client.unbounded_send(Ok(text.to_owned()));
    }

    /// Next message the client sent on this connection.
    pub async fn next_message(&mut self) -> Option<SignalingMessage> {
        let text = self.from_client.next().await?;
        Some(SignalingMessage::decode(&text).unwrap())
    }

    /// Everything the client has sent so far, without waiting.
    pub fn drain(&mut self) -> Vec<SignalingMessage> {
        let mut messages = Vec::new();
        while let Some(Some(text)) = self.from_client.next().now_or_never() {
            messages.push(SignalingMessage::decode(&text).unwrap());
        }
        messages
    }

    /// Drop the connection from the server side.
    pub fn disconnect(self) {
        let _ = self.to_client.unbounded_send(Err(SignalingError::Closed));
    }
}

/// Connector whose connections are handed to the test as [`ServerConnection`]s.
pub struct FakeConnector {
    accepted: mpsc::UnboundedSender<ServerConnection>,
    attempts: Mutex<Vec<Url>>,
    refuse_next: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerConnection>) {
        let (accepted, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            accepted,
            attempts: Mutex::new(Vec::new()),
            refuse_next: AtomicUsize::new(0),
        });
        (connector, rx)
    }

    /// The next `count` attempts fail as if the server were down.
    pub fn refuse_next(&self, count: usize) {
        self.refuse_next.store(count, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> Vec<Url> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &Url) -> Result<(WireSink, WireStream), SignalingError> {
        self.attempts.lock().unwrap().push(url.clone());

        let refused = self
            .refuse_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(SignalingError::Connect("connection refused".to_owned()));
        }

        let (client_tx, from_client) = wire::unbounded::<String>();
        let (to_client, client_rx) = wire::unbounded::<Result<String, SignalingError>>();

        let _ = self.accepted.send(ServerConnection {
            url: url.clone(),
            to_client,
            from_client,
        });

        let sink = client_tx.sink_map_err(|e| SignalingError::Transport(e.to_string()));
        Ok((Box::pin(sink), Box::pin(client_rx)))
    }
}
