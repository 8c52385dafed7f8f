//! Progress poller
//!
//! Republishes the playback position once per display tick while the
//! session it was started for is audibly running. The loop re-checks its
//! continuation predicate every tick and stops on its own; nothing cancels
//! it from outside.
//!
//! Continues only while all hold:
//! - a session exists and is `Running`
//! - that session is still the one the user selected (same generation)
//! - no seek drag is in progress

use crate::error::Result;
use crate::playback::session::{SessionSignal, SessionState};
use crate::state::SharedState;
use async_trait::async_trait;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// What the poller sees when it looks at the current session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollTarget {
    /// No session at all
    Gone,
    /// A newer selection replaced the polled session
    Superseded,
    /// The polled session exists but is not emitting
    NotRunning(SessionState),
    Playing {
        offset_seconds: f64,
        duration_seconds: f64,
    },
}

/// Read-only view of the current session for the poller
#[async_trait]
pub trait ProgressSource: Send + Sync {
    /// Inspect the current session on behalf of the poller for `generation`.
    ///
    /// # Errors
    /// Any asynchronous output failure observed on the session.
    async fn probe(&self, generation: u64) -> Result<PollTarget>;
}

/// Why a poller stopped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollExit {
    Dragging,
    NoSession,
    Superseded,
    NotRunning(SessionState),
    /// The owner of the session went away
    SourceDropped,
}

pub struct ProgressPoller {
    source: Weak<dyn ProgressSource>,
    state: Arc<SharedState>,
    generation: u64,
    tick: Duration,
}

impl ProgressPoller {
    pub fn new(
        source: Weak<dyn ProgressSource>,
        state: Arc<SharedState>,
        generation: u64,
        tick: Duration,
    ) -> Self {
        Self {
            source,
            state,
            generation,
            tick,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run until the predicate fails.
    ///
    /// # Errors
    /// Propagates session failures observed while probing.
    pub async fn run(&self) -> Result<PollExit> {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            if self.state.is_dragging() {
                return Ok(PollExit::Dragging);
            }

            let Some(source) = self.source.upgrade() else {
                return Ok(PollExit::SourceDropped);
            };

            match source.probe(self.generation).await? {
                PollTarget::Playing {
                    offset_seconds,
                    duration_seconds,
                } => {
                    // Drag may have started while probing
                    if self.state.is_dragging() {
                        return Ok(PollExit::Dragging);
                    }
                    trace!("Progress {:.2}/{:.2}s", offset_seconds, duration_seconds);
                    self.state
                        .publish_progress(offset_seconds, duration_seconds)
                        .await;
                }
                PollTarget::Gone => return Ok(PollExit::NoSession),
                PollTarget::Superseded => return Ok(PollExit::Superseded),
                PollTarget::NotRunning(state) => return Ok(PollExit::NotRunning(state)),
            }
        }
    }

    /// Run on the tokio runtime, reporting failures to the coordinator
    pub fn spawn(self, signals: UnboundedSender<SessionSignal>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let generation = self.generation;
            match self.run().await {
                Ok(exit) => debug!("Progress poller {} stopped: {:?}", generation, exit),
                Err(error) => {
                    debug!("Progress poller {} failed: {}", generation, error);
                    let _ = signals.send(SessionSignal::PollerFailed { generation, error });
                }
            }
        })
    }
}
