//! Test helper modules for ytmp-ap integration tests
//!
//! - MockBackend: scripted output graphs that count live resources
//! - MemoryByteSource: in-memory audio bytes with per-track latency
//! - audio_generator: WAV payloads built with hound
//! - TestPlayer: a coordinator wired to all of the above

#![allow(dead_code)]

pub mod audio_generator;
pub mod memory_source;
pub mod mock_backend;

pub use audio_generator::{sine_wav_bytes, TEST_SAMPLE_RATE};
pub use memory_source::MemoryByteSource;
pub use mock_backend::{GraphProbe, MockBackend};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use ytmp_ap::playback::{CoordinatorConfig, PlaybackCoordinator};
use ytmp_ap::source::InMemoryCatalog;
use ytmp_ap::SharedState;
use ytmp_common::{PlayerEvent, Track, TrackId};

/// Poll `condition` every 2ms until it holds or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

/// Drain `rx` and return the first event matching `predicate`
pub fn find_event(
    rx: &mut broadcast::Receiver<PlayerEvent>,
    predicate: impl Fn(&PlayerEvent) -> bool,
) -> Option<PlayerEvent> {
    while let Ok(event) = rx.try_recv() {
        if predicate(&event) {
            return Some(event);
        }
    }
    None
}

/// Wait up to `timeout` for an event matching `predicate`
pub async fn next_event(
    rx: &mut broadcast::Receiver<PlayerEvent>,
    timeout: Duration,
    predicate: impl Fn(&PlayerEvent) -> bool,
) -> Option<PlayerEvent> {
    tokio::time::timeout(timeout, async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

pub const WAIT: Duration = Duration::from_secs(2);

/// Coordinator over mock collaborators
pub struct TestPlayer {
    pub coordinator: PlaybackCoordinator,
    pub state: Arc<SharedState>,
    pub backend: Arc<MockBackend>,
    pub bytes: Arc<MemoryByteSource>,
    pub catalog: Arc<InMemoryCatalog>,
}

impl TestPlayer {
    /// Tracks are `(id, duration_seconds, loudness_lufs)`; each gets a short
    /// decodable WAV payload and the ids become the queue in order.
    pub async fn new(tracks: &[(&str, f64, Option<f64>)]) -> Self {
        let bytes = Arc::new(MemoryByteSource::new());
        let catalog = Arc::new(InMemoryCatalog::new());

        for (id, duration, lufs) in tracks {
            bytes.insert(*id, sine_wav_bytes(200, TEST_SAMPLE_RATE, 1, 440.0, 0.5));
            catalog.insert(Track::new(*id, *duration, *lufs)).await;
        }

        let backend = Arc::new(MockBackend::new());
        let state = Arc::new(SharedState::default());
        let coordinator = PlaybackCoordinator::new(
            backend.clone(),
            bytes.clone(),
            catalog.clone(),
            Arc::clone(&state),
            CoordinatorConfig {
                tick_interval: Duration::from_millis(2),
                ..CoordinatorConfig::default()
            },
        );
        coordinator
            .set_queue(tracks.iter().map(|(id, _, _)| TrackId::new(*id)).collect())
            .await;

        Self {
            coordinator,
            state,
            backend,
            bytes,
            catalog,
        }
    }

    /// Probe of the most recently opened graph
    pub fn latest(&self) -> Arc<GraphProbe> {
        self.backend.latest().expect("no graph opened yet")
    }
}
