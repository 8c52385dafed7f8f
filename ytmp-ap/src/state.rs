//! Shared playback state
//!
//! The UI-observable key/value state read reactively by the view layer.
//! Only the playback session path (via the coordinator) and the progress
//! poller write it.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, RwLock};
use ytmp_common::events::{EventBus, PlaybackState, PlayerEvent, RepeatMode};
use ytmp_common::human_time;

/// Snapshot of everything the view layer renders for the transport
#[derive(Debug, Clone, PartialEq)]
pub struct UiPlaybackState {
    pub is_playing: bool,
    /// 0.0..=100.0
    pub progress_percent: f64,
    /// `"m:ss / m:ss"`
    pub time_progress_label: String,
    pub repeat_mode: RepeatMode,
    pub volume_multiplier: f64,
}

impl Default for UiPlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            progress_percent: 0.0,
            time_progress_label: human_time::format_progress_label(0.0, 0.0),
            repeat_mode: RepeatMode::Off,
            volume_multiplier: 1.0,
        }
    }
}

/// Shared state accessible by all components
///
/// Uses RwLock for the snapshot (frequent reads, one writer per tick) and an
/// atomic for the drag flag, which the poller checks every tick.
pub struct SharedState {
    ui: RwLock<UiPlaybackState>,

    /// Set while the user drags the seek slider; the poller must not publish
    is_dragging: AtomicBool,

    /// Visualizer bars for the current track
    waveform: RwLock<Vec<f32>>,

    events: EventBus,
}

impl SharedState {
    pub fn new(event_capacity: usize, volume_multiplier: f64) -> Self {
        Self {
            ui: RwLock::new(UiPlaybackState {
                volume_multiplier,
                ..UiPlaybackState::default()
            }),
            is_dragging: AtomicBool::new(false),
            waveform: RwLock::new(Vec::new()),
            events: EventBus::new(event_capacity),
        }
    }

    pub async fn ui_snapshot(&self) -> UiPlaybackState {
        self.ui.read().await.clone()
    }

    pub async fn is_playing(&self) -> bool {
        self.ui.read().await.is_playing
    }

    /// Set the playing flag, broadcasting `PlaybackStateChanged` on change
    pub async fn set_playing(&self, playing: bool) {
        let old = {
            let mut ui = self.ui.write().await;
            std::mem::replace(&mut ui.is_playing, playing)
        };

        if old != playing {
            self.broadcast_event(PlayerEvent::PlaybackStateChanged {
                old_state: Self::playback_state(old),
                new_state: Self::playback_state(playing),
                timestamp: chrono::Utc::now(),
            });
        }
    }

    fn playback_state(playing: bool) -> PlaybackState {
        if playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }

    /// Publish position as percent plus `"m:ss / m:ss"` label
    pub async fn publish_progress(&self, position_seconds: f64, duration_seconds: f64) {
        let mut ui = self.ui.write().await;
        ui.progress_percent = human_time::progress_percent(position_seconds, duration_seconds);
        ui.time_progress_label =
            human_time::format_progress_label(position_seconds, duration_seconds);
    }

    /// Publish only the time label (provisional drag position)
    pub async fn publish_label(&self, position_seconds: f64, duration_seconds: f64) {
        self.ui.write().await.time_progress_label =
            human_time::format_progress_label(position_seconds, duration_seconds);
    }

    pub async fn repeat_mode(&self) -> RepeatMode {
        self.ui.read().await.repeat_mode
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) {
        self.ui.write().await.repeat_mode = mode;
    }

    pub async fn volume(&self) -> f64 {
        self.ui.read().await.volume_multiplier
    }

    pub async fn set_volume(&self, volume: f64) {
        self.ui.write().await.volume_multiplier = volume;
    }

    pub fn set_dragging(&self, dragging: bool) {
        self.is_dragging.store(dragging, Ordering::SeqCst);
    }

    pub fn is_dragging(&self) -> bool {
        self.is_dragging.load(Ordering::SeqCst)
    }

    pub async fn set_waveform(&self, bars: Vec<f32>) {
        *self.waveform.write().await = bars;
    }

    pub async fn waveform(&self) -> Vec<f32> {
        self.waveform.read().await.clone()
    }

    /// Broadcast an event to all listeners (no listeners is fine)
    pub fn broadcast_event(&self, event: PlayerEvent) {
        self.events.emit_lossy(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(256, 1.0)
    }
}
