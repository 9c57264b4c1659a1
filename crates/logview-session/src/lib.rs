//! Channel lifecycle and stream-session state machine.
//!
//! Provides:
//! - `Channel` - Abstract bidirectional message transport
//! - `WsChannel` - WebSocket implementation
//! - `StreamSession` - Per-widget ingestion state machine
//! - `SessionRegistry` - One live session per widget identity

pub mod channel;
pub mod registry;
pub mod session;
pub mod websocket;

pub use channel::{Channel, ChannelError, ChannelEvent};
pub use registry::{ChannelFactory, SessionRegistry, WsConnector};
pub use session::{
    ChannelTarget, OnClose, ScriptKind, SessionHandle, SessionParams, SessionState, StreamSession,
};
pub use websocket::WsChannel;
