//! Tail a remote process log over the designer exec WebSocket.
//!
//! Run with: cargo run -p log-tail -- ws://localhost:49483/api/designer/v1/ws/exec "ls -la"

use std::sync::Arc;

use anyhow::{Context, bail};
use futures::StreamExt;
use logview_core::HistoryStore;
use logview_session::{ScriptKind, SessionParams, SessionRegistry};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(url), Some(cmd)) = (args.next(), args.next()) else {
        bail!("usage: log-tail <ws-url> <command>");
    };
    let url = Url::parse(&url).context("invalid WebSocket URL")?;

    let widget_id = Uuid::new_v4().to_string();
    let registry = SessionRegistry::new(Arc::new(HistoryStore::new()));
    let mut lines = registry.store().history_plus_stream(&widget_id);

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    let params = SessionParams {
        url: Some(url),
        script_kind: Some(ScriptKind::RunScript),
        script_payload: Some(json!({
            "type": "exec_cmd",
            "base_dir": ".",
            "cmd": cmd,
        })),
    };

    let opened = registry
        .open(
            &widget_id,
            params,
            Box::new(move || {
                let _ = done_tx.send(());
            }),
        )
        .await
        .context("failed to open channel")?;
    if !opened {
        bail!("session parameters incomplete");
    }

    tracing::info!(widget_id = %widget_id, "session open, streaming log lines");

    let printer = tokio::spawn(async move {
        while let Some(batch) = lines.next().await {
            for line in batch {
                println!("{line}");
            }
        }
    });

    // Wait for the session to close (remote exit or Ctrl-C teardown).
    tokio::select! {
        _ = done_rx => {}
        _ = tokio::signal::ctrl_c() => {
            registry.close(&widget_id).await;
        }
    }

    printer.abort();
    Ok(())
}
