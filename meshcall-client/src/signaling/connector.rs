use crate::error::SignalingError;
use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt, future};
use std::pin::Pin;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

/// Outgoing half of one signaling connection: text frames.
pub type WireSink = Pin<Box<dyn Sink<String, Error = SignalingError> + Send>>;

/// Incoming half. Ends (or yields an error) when the connection is gone.
pub type WireStream = Pin<Box<dyn Stream<Item = Result<String, SignalingError>> + Send>>;

/// Opens one connection to the signaling server.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<(WireSink, WireStream), SignalingError>;
}

/// WebSocket transport used against a real server.
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &Url) -> Result<(WireSink, WireStream), SignalingError> {
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| SignalingError::Connect(e.to_string()))?;
        let (write, read) = ws.split();

        let sink = write
            .sink_map_err(|e| SignalingError::Transport(e.to_string()))
            .with(|text: String| future::ready(Ok::<_, SignalingError>(Message::Text(text))));

        let stream = read.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Close(reason)) => {
                    debug!("Close frame received: {:?}", reason);
                    Some(Err(SignalingError::Closed))
                }
                Ok(_) => None,
                Err(e) => Some(Err(SignalingError::Transport(e.to_string()))),
            })
        });

        Ok((Box::pin(sink), Box::pin(stream)))
    }
}
