//! Event types for the YTMP event system
//!
//! Provides the shared event definitions and the EventBus used by the playback
//! core to notify the view layer about lifecycle changes. High-frequency data
//! (progress percent, time label) is not broadcast; views read it from the
//! shared playback state instead.

mod playback_types;

pub use playback_types::{PlaybackState, RepeatMode};

use crate::TrackId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Player event types
///
/// Events are broadcast via EventBus and can be serialized for transmission
/// to a UI process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// A new session began emitting sound
    TrackStarted {
        track_id: TrackId,
        /// Offset the session started from (seconds)
        start_offset_seconds: f64,
        /// Gain multiplier applied to the output
        gain: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transport state changed (Playing ↔ Paused, or Stopped)
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track reached its natural end of stream
    TrackEnded {
        track_id: TrackId,
        repeat_mode: RepeatMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session creation or a running session failed
    ///
    /// `retryable` is true for transient failures (fetch, output device
    /// hiccups) and false when retrying the same track cannot succeed.
    PlaybackFailed {
        track_id: Option<TrackId>,
        message: String,
        retryable: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    RepeatModeChanged {
        repeat_mode: RepeatMode,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    ShuffleChanged {
        shuffle: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    VolumeChanged {
        volume: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Visualizer bars were recomputed
    WaveformUpdated {
        track_id: TrackId,
        bar_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Event type name (matches the serialized `type` tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::TrackStarted { .. } => "TrackStarted",
            PlayerEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            PlayerEvent::TrackEnded { .. } => "TrackEnded",
            PlayerEvent::PlaybackFailed { .. } => "PlaybackFailed",
            PlayerEvent::RepeatModeChanged { .. } => "RepeatModeChanged",
            PlayerEvent::ShuffleChanged { .. } => "ShuffleChanged",
            PlayerEvent::VolumeChanged { .. } => "VolumeChanged",
            PlayerEvent::WaveformUpdated { .. } => "WaveformUpdated",
        }
    }
}

/// Broadcast channel wrapper shared by all event producers
///
/// Slow subscribers lag and lose the oldest events rather than blocking
/// producers.
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use ytmp_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity: capacity.max(1) }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
