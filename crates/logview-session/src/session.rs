//! Per-widget stream session state machine.

use std::{ops::ControlFlow, sync::Arc};

use logview_core::{HistoryStore, InboundEvent, WidgetId, classify};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use url::Url;

use crate::channel::{Channel, ChannelEvent};

/// Kind of script driven over the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptKind {
    /// Run an arbitrary command on the remote side.
    RunScript,
    /// Install a single package.
    Install,
    /// Install all dependencies of an app.
    InstallAll,
}

/// Connection descriptor for one session; immutable for its lifetime.
#[derive(Debug, Clone)]
pub struct ChannelTarget {
    pub url: Url,
    pub script_kind: ScriptKind,
    pub script_payload: Value,
}

/// Session parameters as supplied by the widget owner.
///
/// All three must be present before a channel is opened; with any of them
/// absent the session never leaves `Idle`.
#[derive(Debug, Clone, Default)]
pub struct SessionParams {
    pub url: Option<Url>,
    pub script_kind: Option<ScriptKind>,
    pub script_payload: Option<Value>,
}

impl SessionParams {
    /// Collapse into a complete target, or `None` if any part is missing.
    #[must_use]
    pub fn into_target(self) -> Option<ChannelTarget> {
        Some(ChannelTarget {
            url: self.url?,
            script_kind: self.script_kind?,
            script_payload: self.script_payload?,
        })
    }
}

/// Session lifecycle state. `Closed` is terminal; re-entering it is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

/// Callback invoked exactly once when the session closes.
pub type OnClose = Box<dyn FnOnce() + Send>;

/// Handle to a spawned session, used by the owner for teardown.
pub struct SessionHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl SessionHandle {
    /// Request teardown: the channel is forced closed and no further
    /// events are delivered. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Wait for the session task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Ingestion state machine for one widget's log stream.
///
/// Owns one channel instance for its lifetime, classifies each inbound
/// payload and appends the resulting display lines to the shared history
/// store under its widget identity.
pub struct StreamSession<C: Channel> {
    widget_id: WidgetId,
    store: Arc<HistoryStore>,
    channel: C,
    script_payload: Value,
    state: SessionState,
    on_close: Option<OnClose>,
}

impl<C: Channel + 'static> StreamSession<C> {
    /// Create a session over an already-connected channel.
    #[must_use]
    pub fn new(
        widget_id: WidgetId,
        store: Arc<HistoryStore>,
        channel: C,
        script_payload: Value,
        on_close: OnClose,
    ) -> Self {
        Self {
            widget_id,
            store,
            channel,
            script_payload,
            state: SessionState::Idle,
            on_close: Some(on_close),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Spawn the session onto the runtime, returning a teardown handle.
    ///
    /// Dropping the handle also tears the session down.
    #[must_use]
    pub fn spawn(self) -> SessionHandle {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(self.run(rx));
        SessionHandle {
            shutdown: Some(tx),
            task,
        }
    }

    /// Drive the session until the channel closes or teardown is requested.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        self.state = SessionState::Connecting;

        loop {
            let event = tokio::select! {
                _ = &mut shutdown => {
                    self.channel.close().await;
                    break;
                }
                event = self.channel.next_event() => event,
            };

            let Some(event) = event else { break };
            if self.handle_event(event).await.is_break() {
                break;
            }
        }

        self.finish();
    }

    async fn handle_event(&mut self, event: ChannelEvent) -> ControlFlow<()> {
        match event {
            ChannelEvent::Opened => {
                self.state = SessionState::Open;
                tracing::debug!(widget_id = %self.widget_id, "channel connected");
                // First outbound message is always the script payload.
                let script = self.script_payload.to_string();
                if let Err(e) = self.channel.send_text(script).await {
                    tracing::error!(widget_id = %self.widget_id, "failed to send script: {e}");
                }
                ControlFlow::Continue(())
            }
            ChannelEvent::Payload(raw) => {
                if self.state == SessionState::Open {
                    self.ingest(&raw).await;
                }
                ControlFlow::Continue(())
            }
            ChannelEvent::TransportError(err) => {
                // Non-fatal: closure is driven by the remote end or teardown.
                tracing::error!(widget_id = %self.widget_id, "channel transport error: {err}");
                ControlFlow::Continue(())
            }
            ChannelEvent::Closed => ControlFlow::Break(()),
        }
    }

    async fn ingest(&mut self, raw: &str) {
        match classify(raw) {
            InboundEvent::StdoutLine(line)
            | InboundEvent::StderrLine(line)
            | InboundEvent::NormalLine(line) => {
                self.store.append(&self.widget_id, vec![line]);
            }
            InboundEvent::Exit {
                code,
                error_message,
            } => {
                let mut lines = Vec::new();
                if let Some(message) = error_message {
                    lines.push(message);
                }
                lines.push(format!("Process exited with code {code}. Closing..."));
                self.store.append(&self.widget_id, lines);

                self.channel.close().await;
                // Suppress any payloads still in flight.
                self.state = SessionState::Closed;
            }
            InboundEvent::Failure { message } => {
                self.store
                    .append(&self.widget_id, vec![format!("Error: {message}\n")]);
            }
            InboundEvent::RawText(text) => {
                self.store.append(&self.widget_id, vec![text]);
            }
            InboundEvent::Unrecognized(payload) => {
                self.store
                    .append(&self.widget_id, vec![format!("Unknown message: {payload}")]);
            }
        }
    }

    fn finish(&mut self) {
        self.state = SessionState::Closed;
        tracing::debug!(widget_id = %self.widget_id, "session closed");
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}
