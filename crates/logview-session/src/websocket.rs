//! WebSocket implementation of the channel abstraction.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};
use url::Url;

use crate::channel::{Channel, ChannelError, ChannelEvent};

/// Client-side WebSocket channel.
///
/// Yields `Opened` as its first event, then maps text and UTF-8 binary
/// frames to `Payload`, stream errors to `TransportError`, and close
/// frames or stream end to a single `Closed`.
pub struct WsChannel {
    stream: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    opened_pending: bool,
    closed_delivered: bool,
}

impl WsChannel {
    /// Connect to `url`.
    ///
    /// # Errors
    /// Returns `ChannelError::Connect` if the handshake fails.
    pub async fn connect(url: &Url) -> Result<Self, ChannelError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| ChannelError::Connect(e.to_string()))?;

        Ok(Self {
            stream: Some(stream),
            opened_pending: true,
            closed_delivered: false,
        })
    }

    fn deliver_closed(&mut self) -> Option<ChannelEvent> {
        if self.closed_delivered {
            None
        } else {
            self.closed_delivered = true;
            Some(ChannelEvent::Closed)
        }
    }
}

#[async_trait]
impl Channel for WsChannel {
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ChannelError::Send("channel is closed".to_string()));
        };
        stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ChannelError::Send(e.to_string()))
    }

    async fn next_event(&mut self) -> Option<ChannelEvent> {
        if self.opened_pending {
            self.opened_pending = false;
            return Some(ChannelEvent::Opened);
        }

        let Some(stream) = self.stream.as_mut() else {
            return self.deliver_closed();
        };

        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(ChannelEvent::Payload(text.to_string()));
                }
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(ChannelEvent::Payload(text)),
                    Err(_) => continue,
                },
                Some(Ok(Message::Close(_))) | None => {
                    self.stream = None;
                    return self.deliver_closed();
                }
                // Ping/pong is answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Some(ChannelEvent::TransportError(e.to_string())),
            }
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.close(None).await;
        }
    }
}
