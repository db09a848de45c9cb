//! Progress events emitted by the orchestrators.
//!
//! [`EventBus`] wraps a `tokio::sync::broadcast` channel with a bounded
//! ring buffer of recent events so that late subscribers can catch up.
//! Orchestrators never talk to the bus directly; they hold a
//! [`ProgressChannel`] scoped to one run.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::ids::RunId;

/// Maximum number of events retained in the ring buffer.
const MAX_RECENT_EVENTS: usize = 100;

// ---------------------------------------------------------------------------
// EventPayload
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EventPayload {
    // -- Segmentation --------------------------------------------------------
    SegmentationStarted { run_id: RunId },
    SegmentationProgress { run_id: RunId, message: String },
    SegmentationFinished { run_id: RunId },

    // -- Upload --------------------------------------------------------------
    UploadStarted { run_id: RunId },
    UploadProgress { run_id: RunId, message: String },
    UploadFinished { run_id: RunId },
    UploadPathReady { run_id: RunId, url: String },
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// A timestamped event ready for broadcast.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast channel with a bounded ring buffer of recent events.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    recent: RwLock<VecDeque<Event>>,
}

impl EventBus {
    /// Create a new event bus.
    ///
    /// `capacity` is the broadcast buffer size; a subscriber that falls more
    /// than `capacity` events behind observes a lag error instead of
    /// blocking the sender.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            recent: RwLock::new(VecDeque::with_capacity(MAX_RECENT_EVENTS)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Broadcast to current subscribers and record in the ring buffer.
    /// Never blocks.
    pub fn broadcast(&self, payload: EventPayload) {
        let event = Event::new(payload);

        {
            let mut recent = self.recent.write();
            if recent.len() >= MAX_RECENT_EVENTS {
                recent.pop_back();
            }
            recent.push_front(event.clone());
        }

        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Return the `n` most recent events (newest first).
    pub fn recent_events(&self, n: usize) -> Vec<Event> {
        let recent = self.recent.read();
        recent.iter().take(n).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

// ---------------------------------------------------------------------------
// ProgressChannel
// ---------------------------------------------------------------------------

/// Which orchestrator a [`ProgressChannel`] reports for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Segmentation,
    Upload,
}

/// Fire-and-forget progress reporting for a single run.
///
/// Carries a busy/idle flag and free-text status lines. Emission order is
/// preserved; nothing is acknowledged.
#[derive(Clone)]
pub struct ProgressChannel {
    bus: Arc<EventBus>,
    kind: RunKind,
    run_id: RunId,
}

impl ProgressChannel {
    /// Open a channel for a fresh run.
    pub fn new(bus: Arc<EventBus>, kind: RunKind) -> Self {
        Self {
            bus,
            kind,
            run_id: RunId::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Mark the run busy (started) or idle (finished).
    pub fn busy(&self, busy: bool) {
        let run_id = self.run_id;
        let payload = match (self.kind, busy) {
            (RunKind::Segmentation, true) => EventPayload::SegmentationStarted { run_id },
            (RunKind::Segmentation, false) => EventPayload::SegmentationFinished { run_id },
            (RunKind::Upload, true) => EventPayload::UploadStarted { run_id },
            (RunKind::Upload, false) => EventPayload::UploadFinished { run_id },
        };
        self.bus.broadcast(payload);
    }

    /// Emit a human-readable status line.
    pub fn status(&self, message: impl Into<String>) {
        let run_id = self.run_id;
        let message = message.into();
        let payload = match self.kind {
            RunKind::Segmentation => EventPayload::SegmentationProgress { run_id, message },
            RunKind::Upload => EventPayload::UploadProgress { run_id, message },
        };
        self.bus.broadcast(payload);
    }

    /// Announce the playable URL of a finished upload.
    pub fn path_ready(&self, url: impl Into<String>) {
        self.bus.broadcast(EventPayload::UploadPathReady {
            run_id: self.run_id,
            url: url.into(),
        });
    }
}
