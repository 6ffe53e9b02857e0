//! Event types for the sift event system
//!
//! Provides the shared [`ScanEvent`] definitions and the [`EventBus`] the
//! orchestrator writes progress to. The bus is an explicit instance owned by
//! the service state and handed to each scan session; there is no global.

use crate::model::{ScanProgress, ScanResult, ScanStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// sift event types
///
/// Events are broadcast via [`EventBus`] and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScanEvent {
    /// A scan session started loading tracks
    ScanStarted {
        scan_id: Uuid,
        playlist_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Progress counters changed (phase entry, per-track advance)
    ScanProgressUpdate {
        scan_id: Uuid,
        progress: ScanProgress,
        timestamp: DateTime<Utc>,
    },

    /// A track result was produced or updated
    ///
    /// Emitted once per blocklist match during the blocklist phase, then once
    /// per track during the audio phase. Consumers key on `result.track.id`.
    TrackScanned {
        scan_id: Uuid,
        result: ScanResult,
        timestamp: DateTime<Utc>,
    },

    /// Scan reached a terminal state (completed or stopped by the user)
    ScanCompleted {
        scan_id: Uuid,
        stats: ScanStats,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },

    /// Scan aborted on a list-level failure
    ScanFailed {
        scan_id: Uuid,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl ScanEvent {
    /// Event type name used as the SSE event field
    pub fn event_type(&self) -> &'static str {
        match self {
            ScanEvent::ScanStarted { .. } => "ScanStarted",
            ScanEvent::ScanProgressUpdate { .. } => "ScanProgressUpdate",
            ScanEvent::TrackScanned { .. } => "TrackScanned",
            ScanEvent::ScanCompleted { .. } => "ScanCompleted",
            ScanEvent::ScanFailed { .. } => "ScanFailed",
        }
    }

    pub fn scan_id(&self) -> Uuid {
        match self {
            ScanEvent::ScanStarted { scan_id, .. }
            | ScanEvent::ScanProgressUpdate { scan_id, .. }
            | ScanEvent::TrackScanned { scan_id, .. }
            | ScanEvent::ScanCompleted { scan_id, .. }
            | ScanEvent::ScanFailed { scan_id, .. } => *scan_id,
        }
    }
}

/// Broadcast bus carrying [`ScanEvent`]s to SSE clients and tests
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ScanEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a new bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<ScanEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; returns the subscriber count, or an error when nobody
    /// is listening.
    pub fn emit(&self, event: ScanEvent) -> Result<usize, broadcast::error::SendError<ScanEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, silently dropping it when there are no subscribers.
    ///
    /// Progress events are advisory; a scan must not fail because no UI is
    /// attached.
    pub fn emit_lossy(&self, event: ScanEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event dropped: no subscribers");
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ScanProgress;

    fn progress_event(scan_id: Uuid) -> ScanEvent {
        ScanEvent::ScanProgressUpdate {
            scan_id,
            progress: ScanProgress::new(10),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn subscribe_receives_emitted_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let scan_id = Uuid::new_v4();

        bus.emit(progress_event(scan_id)).expect("subscriber exists");

        let received = rx.recv().await.expect("event delivered");
        assert_eq!(received.scan_id(), scan_id);
        assert_eq!(received.event_type(), "ScanProgressUpdate");
    }

    #[test]
    fn emit_lossy_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(progress_event(Uuid::new_v4()));
        assert!(bus.emit(progress_event(Uuid::new_v4())).is_err());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = progress_event(Uuid::new_v4());
        let json = serde_json::to_value(&event).expect("serializes");
        assert_eq!(json["type"], "ScanProgressUpdate");
        assert_eq!(json["progress"]["phase"], "blocklist");
    }
}
