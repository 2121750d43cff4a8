// crates/hypha-rpc/src/handle.rs
//
// EngineHandle: the shared single-writer handle to the incentive engine.
//
// Constructed once by the daemon, then cloned into the RPC server and the
// trigger scheduler. Every mutation holds the write lock for the whole
// operation; the events it produced are published after the lock drops.

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};

use hypha_core::{EngineEvent, HyphaError, Timestamp};
use hypha_economics::Engine;

/// Default capacity of the event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Source of the current unix time, in seconds.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Wall-clock time from the system clock.
pub fn system_clock() -> Clock {
    Arc::new(unix_now)
}

/// Current unix time in seconds. Clamped to 0 before the epoch.
pub fn unix_now() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Cloneable handle to the engine plus its event stream.
#[derive(Clone)]
pub struct EngineHandle {
    engine: Arc<RwLock<Engine>>,
    events: broadcast::Sender<EngineEvent>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("subscribers", &self.events.receiver_count())
            .finish()
    }
}

impl EngineHandle {
    /// Wrap an engine, with an event channel of the given capacity.
    pub fn new(engine: Engine, event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            engine: Arc::new(RwLock::new(engine)),
            events,
        }
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Run a read-only closure under the read lock.
    pub async fn read<R>(&self, f: impl FnOnce(&Engine) -> R) -> R {
        let engine = self.engine.read().await;
        f(&engine)
    }

    /// Run a mutation under the write lock and publish the events it produced.
    pub async fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Engine) -> Result<T, HyphaError>,
    ) -> Result<T, HyphaError> {
        let (result, events) = {
            let mut engine = self.engine.write().await;
            let result = f(&mut engine);
            (result, engine.take_events())
        };
        for event in events {
            // Sending only fails when nobody is subscribed.
            let _ = self.events.send(event);
        }
        result
    }
}
