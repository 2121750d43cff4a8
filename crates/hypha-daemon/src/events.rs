// crates/hypha-daemon/src/events.rs
//
// Event log task for the Hypha daemon.
//
// Subscribes to the engine's broadcast channel and writes every event to
// the log as a single JSON line. Slow consumers may lag; skipped events are
// reported, not fatal.

use tokio::sync::broadcast::{self, error::RecvError};

use hypha_core::EngineEvent;

/// Consume events until the channel closes. Returns the number logged.
pub async fn run_event_log(mut events: broadcast::Receiver<EngineEvent>) -> u64 {
    let mut logged = 0u64;
    loop {
        match events.recv().await {
            Ok(event) => {
                log_event(&event);
                logged += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Event log lagged; {} events skipped", skipped);
            }
            Err(RecvError::Closed) => {
                tracing::debug!("Event channel closed");
                break;
            }
        }
    }
    logged
}

fn log_event(event: &EngineEvent) {
    match serde_json::to_string(event) {
        Ok(json) => tracing::info!(target: "hypha::events", event = event.name(), "{}", json),
        Err(e) => tracing::warn!("Failed to serialize {} event: {}", event.name(), e),
    }
}
