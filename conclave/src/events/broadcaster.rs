//! Push delivery of run events.

use super::{EventSink, NoOpEventSink, RunEvent};
use crate::core::RunId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Pushes run events to per-run subscribers.
///
/// Each run gets a bounded broadcast channel. Slow subscribers lag and drop
/// the oldest events rather than exerting backpressure on the driver. After
/// a run's terminal event the channel is closed, so subscribers observe
/// end-of-stream; a client that cannot (or does not) subscribe polls run
/// snapshots instead, with no server-side behavior change.
pub struct EventBroadcaster {
    channels: DashMap<RunId, broadcast::Sender<RunEvent>>,
    capacity: usize,
    sink: Arc<dyn EventSink>,
}

impl EventBroadcaster {
    /// Creates a broadcaster with the given per-run channel depth.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Attaches an observability sink that sees every published event.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Opens the event channel for a run. Idempotent.
    pub fn register(&self, run_id: RunId) {
        self.channels
            .entry(run_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0);
    }

    /// Subscribes to a run's events.
    ///
    /// Returns `None` for runs that were never registered or whose stream
    /// already closed; such clients fall back to polling.
    #[must_use]
    pub fn subscribe(&self, run_id: RunId) -> Option<broadcast::Receiver<RunEvent>> {
        self.channels.get(&run_id).map(|tx| tx.subscribe())
    }

    /// Publishes an event to the run's subscribers and the sink.
    ///
    /// Publishing never blocks and never mutates run state. A terminal
    /// event closes the run's channel.
    pub fn publish(&self, event: RunEvent) {
        self.sink.try_emit(&event);

        let run_id = event.run_id;
        let terminal = event.kind.is_terminal();

        if let Some(tx) = self.channels.get(&run_id) {
            // A send error only means nobody is subscribed right now.
            let _ = tx.send(event);
        }

        if terminal {
            debug!(run_id = %run_id, "closing event stream");
            self.channels.remove(&run_id);
        }
    }

    /// Returns the number of open run streams.
    #[must_use]
    pub fn open_streams(&self) -> usize {
        self.channels.len()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("capacity", &self.capacity)
            .field("open_streams", &self.open_streams())
            .finish()
    }
}
