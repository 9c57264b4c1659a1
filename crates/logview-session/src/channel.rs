//! Abstract bidirectional message channel.

use async_trait::async_trait;
use thiserror::Error;

/// One notification from the channel.
///
/// A channel yields a lazy, non-restartable sequence of these: `Opened`
/// at most once and first, then any number of `Payload`/`TransportError`,
/// then `Closed` at most once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The channel is established and ready to send.
    Opened,
    /// One inbound payload, delivered in arrival order.
    Payload(String),
    /// A transport-level failure; the channel may still deliver events.
    TransportError(String),
    /// The channel closed, from either side.
    Closed,
}

/// Channel error.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Connect failed: {0}")]
    Connect(String),
    #[error("Send failed: {0}")]
    Send(String),
}

/// Full-duplex message transport between a widget and a remote process.
#[async_trait]
pub trait Channel: Send {
    /// Send one outbound text message.
    ///
    /// # Errors
    /// Returns an error if the channel is closed or the write fails.
    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    /// Wait for the next channel event.
    ///
    /// Returns `None` once the event sequence is exhausted.
    async fn next_event(&mut self) -> Option<ChannelEvent>;

    /// Close the channel. Idempotent.
    async fn close(&mut self);
}
