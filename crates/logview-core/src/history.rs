//! Broadcast + history store for per-widget log lines.

use std::{
    collections::HashMap,
    sync::RwLock,
};

use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Opaque key identifying one log-viewer widget instance.
pub type WidgetId = String;

/// Capacity of each per-widget broadcast channel.
const BROADCAST_CAPACITY: usize = 1024;

struct Entry {
    lines: Vec<String>,
    sender: broadcast::Sender<Vec<String>>,
}

impl Entry {
    fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            lines: Vec::new(),
            sender,
        }
    }
}

/// Append-only log of display lines, keyed by widget identity.
///
/// Shared across all open sessions; each session is the sole writer for
/// its own identity key, so appends for distinct widgets never interfere.
/// Live subscribers receive each appended batch, letting the display
/// layer re-render as lines arrive. History outlives the session that
/// wrote it, so the final state stays visible after the channel closes.
pub struct HistoryStore {
    inner: RwLock<HashMap<WidgetId, Entry>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Append a batch of lines for `id`, creating its history on first use.
    ///
    /// Lines keep the order they were issued in and are never rewritten.
    pub fn append(&self, id: &str, lines: Vec<String>) {
        let mut inner = self.inner.write().unwrap();
        let entry = inner.entry(id.to_string()).or_insert_with(Entry::new);
        entry.lines.extend(lines.iter().cloned());
        let _ = entry.sender.send(lines); // live listeners
    }

    /// Snapshot of all lines appended for `id`, in order.
    ///
    /// An identity with no prior appends yields an empty vec, never an error.
    #[must_use]
    pub fn read(&self, id: &str) -> Vec<String> {
        self.inner
            .read()
            .unwrap()
            .get(id)
            .map(|entry| entry.lines.clone())
            .unwrap_or_default()
    }

    /// Subscribe to line batches appended for `id` from now on.
    #[must_use]
    pub fn subscribe(&self, id: &str) -> broadcast::Receiver<Vec<String>> {
        let mut inner = self.inner.write().unwrap();
        inner
            .entry(id.to_string())
            .or_insert_with(Entry::new)
            .sender
            .subscribe()
    }

    /// Stream that yields the current history first, then live batches.
    #[must_use]
    pub fn history_plus_stream(
        &self,
        id: &str,
    ) -> futures::stream::BoxStream<'static, Vec<String>> {
        let (history, rx) = {
            let mut inner = self.inner.write().unwrap();
            let entry = inner.entry(id.to_string()).or_insert_with(Entry::new);
            (entry.lines.clone(), entry.sender.subscribe())
        };

        let hist = futures::stream::iter(std::iter::once(history).filter(|h| !h.is_empty()));
        let live = BroadcastStream::new(rx).filter_map(|res| async move { res.ok() });

        Box::pin(hist.chain(live))
    }

    /// Drop the history and subscribers for `id`.
    ///
    /// Used when the owning widget is removed, not on session teardown.
    pub fn remove(&self, id: &str) {
        self.inner.write().unwrap().remove(id);
    }
}
