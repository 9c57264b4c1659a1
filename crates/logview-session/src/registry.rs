//! One live session per widget identity.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use logview_core::{HistoryStore, WidgetId};
use tokio::sync::RwLock;

use crate::{
    channel::{Channel, ChannelError},
    session::{ChannelTarget, OnClose, SessionHandle, SessionParams, StreamSession},
    websocket::WsChannel,
};

/// Connects a channel for a session target.
///
/// Injected into the registry so sessions can run over any transport.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    type Channel: Channel + 'static;

    /// Establish a channel to `target`.
    ///
    /// # Errors
    /// Returns `ChannelError::Connect` if establishment fails.
    async fn connect(&self, target: &ChannelTarget) -> Result<Self::Channel, ChannelError>;
}

/// Production factory dialing the target's WebSocket URL.
pub struct WsConnector;

#[async_trait]
impl ChannelFactory for WsConnector {
    type Channel = WsChannel;

    async fn connect(&self, target: &ChannelTarget) -> Result<WsChannel, ChannelError> {
        WsChannel::connect(&target.url).await
    }
}

/// Registry of active stream sessions, sharing one history store.
///
/// Opening a session for an identity that already has one replaces it:
/// the old session is torn down, and waited for, before the new channel
/// is connected, so a key never has two writers and listeners are never
/// duplicated.
pub struct SessionRegistry<F: ChannelFactory = WsConnector> {
    store: Arc<HistoryStore>,
    connector: F,
    active: RwLock<HashMap<WidgetId, SessionHandle>>,
}

impl SessionRegistry<WsConnector> {
    /// Create a registry backed by `store`, dialing WebSocket targets.
    #[must_use]
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self::with_connector(WsConnector, store)
    }
}

impl<F: ChannelFactory> SessionRegistry<F> {
    /// Create a registry with an injected channel factory.
    #[must_use]
    pub fn with_connector(connector: F, store: Arc<HistoryStore>) -> Self {
        Self {
            store,
            connector,
            active: RwLock::new(HashMap::new()),
        }
    }

    /// The shared history store, for the display layer to read and subscribe.
    #[must_use]
    pub fn store(&self) -> Arc<HistoryStore> {
        Arc::clone(&self.store)
    }

    /// Open a session for `widget_id`.
    ///
    /// With incomplete `params` no channel is opened and `Ok(false)` is
    /// returned; the widget stays idle. Otherwise the channel is
    /// connected, the session spawned, and `Ok(true)` returned. `on_close`
    /// fires exactly once when that session ends.
    ///
    /// # Errors
    /// Returns `ChannelError::Connect` if channel establishment fails.
    pub async fn open(
        &self,
        widget_id: &str,
        params: SessionParams,
        on_close: OnClose,
    ) -> Result<bool, ChannelError> {
        let Some(target) = params.into_target() else {
            return Ok(false);
        };

        // Replace rather than duplicate a session for the same identity.
        // The old session must be gone before the new one can write, so
        // the identity key keeps a single writer.
        if let Some(mut existing) = self.active.write().await.remove(widget_id) {
            tracing::debug!(widget_id, "replacing existing session");
            existing.shutdown();
            existing.join().await;
        }

        tracing::debug!(
            widget_id,
            url = %target.url,
            script_kind = ?target.script_kind,
            "opening channel"
        );
        let channel = self.connector.connect(&target).await?;

        let session = StreamSession::new(
            widget_id.to_string(),
            Arc::clone(&self.store),
            channel,
            target.script_payload,
            on_close,
        );
        self.active
            .write()
            .await
            .insert(widget_id.to_string(), session.spawn());

        Ok(true)
    }

    /// Tear down the session for `widget_id`, if any. Idempotent.
    ///
    /// History written by the session stays in the store.
    pub async fn close(&self, widget_id: &str) {
        if let Some(mut handle) = self.active.write().await.remove(widget_id) {
            handle.shutdown();
            handle.join().await;
        }
    }

    /// Tear down every active session.
    pub async fn close_all(&self) {
        let handles: Vec<_> = self.active.write().await.drain().collect();
        for (_, mut handle) in handles {
            handle.shutdown();
            handle.join().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use serde_json::json;
    use tokio_test::assert_ok;
    use url::Url;

    use crate::channel::ChannelEvent;
    use crate::session::ScriptKind;

    use super::*;

    /// Channel that replays scripted events, then stays open until the
    /// session tears it down.
    struct HangingChannel {
        events: VecDeque<ChannelEvent>,
        closed: bool,
        closed_delivered: bool,
    }

    impl HangingChannel {
        fn new(events: Vec<ChannelEvent>) -> Self {
            Self {
                events: events.into(),
                closed: false,
                closed_delivered: false,
            }
        }
    }

    #[async_trait]
    impl Channel for HangingChannel {
        async fn send_text(&mut self, _text: String) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn next_event(&mut self) -> Option<ChannelEvent> {
            if self.closed {
                if self.closed_delivered {
                    return None;
                }
                self.closed_delivered = true;
                return Some(ChannelEvent::Closed);
            }
            if let Some(event) = self.events.pop_front() {
                return Some(event);
            }
            // Keep the session open until shutdown.
            std::future::pending().await
        }

        async fn close(&mut self) {
            self.closed = true;
        }
    }

    /// Factory handing out pre-scripted channels in order.
    struct QueueConnector {
        channels: Mutex<VecDeque<HangingChannel>>,
    }

    impl QueueConnector {
        fn new(channels: Vec<HangingChannel>) -> Self {
            Self {
                channels: Mutex::new(channels.into()),
            }
        }
    }

    #[async_trait]
    impl ChannelFactory for QueueConnector {
        type Channel = HangingChannel;

        async fn connect(&self, _target: &ChannelTarget) -> Result<HangingChannel, ChannelError> {
            self.channels
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ChannelError::Connect("no channel scripted".to_string()))
        }
    }

    fn complete_params() -> SessionParams {
        SessionParams {
            url: Some(Url::parse("ws://localhost:49483/api/designer/v1/ws/exec").unwrap()),
            script_kind: Some(ScriptKind::RunScript),
            script_payload: Some(json!({"type": "exec_cmd", "cmd": "ls"})),
        }
    }

    fn output(line: &str) -> ChannelEvent {
        ChannelEvent::Payload(json!({"type": "standard_output", "data": line}).to_string())
    }

    #[tokio::test]
    async fn incomplete_params_stay_idle() {
        let registry = SessionRegistry::new(Arc::new(HistoryStore::new()));

        let opened = tokio_test::assert_ok!(
            registry
                .open("w1", SessionParams::default(), Box::new(|| {}))
                .await
        );

        assert!(!opened);
        assert!(registry.store().read("w1").is_empty());
    }

    #[tokio::test]
    async fn close_without_session_is_idempotent() {
        let registry = SessionRegistry::new(Arc::new(HistoryStore::new()));
        registry.close("w1").await;
        registry.close("w1").await;
    }

    #[tokio::test]
    async fn reopening_replaces_the_previous_session() {
        let connector = QueueConnector::new(vec![
            HangingChannel::new(vec![ChannelEvent::Opened, output("from-first")]),
            HangingChannel::new(vec![
                ChannelEvent::Opened,
                output("from-second"),
                ChannelEvent::Closed,
            ]),
        ]);
        let registry = SessionRegistry::with_connector(connector, Arc::new(HistoryStore::new()));
        let store = registry.store();
        let mut batches = store.subscribe("w1");

        let first_closes = Arc::new(AtomicUsize::new(0));
        let first_closes_cb = Arc::clone(&first_closes);
        tokio_test::assert_ok!(
            registry
                .open(
                    "w1",
                    complete_params(),
                    Box::new(move || {
                        first_closes_cb.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .await
        );

        // First session is live and has written its line.
        assert_eq!(batches.recv().await.unwrap(), vec!["from-first"]);
        assert_eq!(first_closes.load(Ordering::SeqCst), 0);

        let second_closes = Arc::new(AtomicUsize::new(0));
        let second_closes_cb = Arc::clone(&second_closes);
        tokio_test::assert_ok!(
            registry
                .open(
                    "w1",
                    complete_params(),
                    Box::new(move || {
                        second_closes_cb.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .await
        );

        // The first session was torn down before the second connected.
        assert_eq!(first_closes.load(Ordering::SeqCst), 1);

        assert_eq!(batches.recv().await.unwrap(), vec!["from-second"]);
        registry.close("w1").await;
        assert_eq!(second_closes.load(Ordering::SeqCst), 1);

        // Only the two sessions' own lines, in order; no interleaved writer.
        assert_eq!(store.read("w1"), vec!["from-first", "from-second"]);
    }

    #[tokio::test]
    async fn connect_failure_registers_nothing() {
        let registry = SessionRegistry::with_connector(
            QueueConnector::new(Vec::new()),
            Arc::new(HistoryStore::new()),
        );

        let err = registry
            .open("w1", complete_params(), Box::new(|| {}))
            .await
            .unwrap_err();

        assert!(matches!(err, ChannelError::Connect(_)));
        assert!(registry.store().read("w1").is_empty());
        // A later close must not find a stale handle.
        registry.close("w1").await;
    }
}
