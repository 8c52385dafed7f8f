//! Seek gestures
//!
//! Turns pointer coordinates on the waveform or the transport slider into a
//! playback position. Dragging only updates the time label; the audio graph
//! is touched once, on release.

use crate::error::Result;
use crate::playback::coordinator::PlaybackCoordinator;
use crate::state::SharedState;
use std::sync::Arc;
use tracing::debug;

/// Horizontal extent of a seekable element, in pointer coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderBounds {
    pub left: f64,
    pub width: f64,
}

impl SliderBounds {
    pub fn new(left: f64, width: f64) -> Self {
        Self { left, width }
    }

    /// `clamp((pointer_x - left) / width, 0, 1)`; 0 for degenerate bounds
    pub fn position(&self, pointer_x: f64) -> f64 {
        if !(self.width.is_finite() && self.width > 0.0) || !pointer_x.is_finite() {
            return 0.0;
        }
        ((pointer_x - self.left) / self.width).clamp(0.0, 1.0)
    }
}

pub struct SeekController {
    coordinator: PlaybackCoordinator,
    state: Arc<SharedState>,
}

impl SeekController {
    pub fn new(coordinator: PlaybackCoordinator) -> Self {
        let state = Arc::clone(coordinator.state());
        Self { coordinator, state }
    }

    /// Click on the waveform: seek immediately (or start the selected track there)
    pub async fn click(&self, pointer_x: f64, bounds: SliderBounds) -> Result<()> {
        let position = bounds.position(pointer_x);
        debug!("Click seek to {:.3}", position);
        self.coordinator.seek(position).await
    }

    /// Begin a slider drag; the poller stops publishing until release
    pub async fn drag_start(&self, pointer_x: f64, bounds: SliderBounds) -> f64 {
        self.state.set_dragging(true);
        let position = bounds.position(pointer_x);
        self.publish_provisional(position).await;
        position
    }

    /// Update the provisional time label only
    pub async fn drag_move(&self, pointer_x: f64, bounds: SliderBounds) -> f64 {
        let position = bounds.position(pointer_x);
        if self.state.is_dragging() {
            self.publish_provisional(position).await;
        }
        position
    }

    /// Release: commit the seek if a session is live, otherwise do nothing
    pub async fn drag_end(&self, pointer_x: f64, bounds: SliderBounds) -> Result<()> {
        let position = bounds.position(pointer_x);
        self.state.set_dragging(false);

        if !self.coordinator.has_session().await {
            debug!("Drag released with no session");
            return Ok(());
        }

        debug!("Drag seek to {:.3}", position);
        self.coordinator.seek(position).await
    }

    async fn publish_provisional(&self, position: f64) {
        if let Some(duration) = self.coordinator.current_duration().await {
            self.state.publish_label(position * duration, duration).await;
        }
    }
}
