//! Playback coordinator
//!
//! Single owner of the current `PlaybackSession`. Every operation that
//! replaces the session takes a fresh generation number and then the create
//! lock, so at most one `create()` is ever in flight and at most one output
//! graph is ever alive. A create overtaken by a newer request stops before
//! opening output; one that finishes in the gap closes its own session
//! instead of installing it.
//!
//! The coordinator is also the single place that reports failures to the
//! view layer (`PlayerEvent::PlaybackFailed`).

use crate::audio::output::AudioBackend;
use crate::audio::types::DecodedBuffer;
use crate::error::{Error, Result};
use crate::playback::poller::{PollTarget, ProgressPoller, ProgressSource};
use crate::playback::session::{
    PlaybackSession, SessionDeps, SessionSettings, SessionSignal, SessionState, StartAt,
};
use crate::playback::waveform;
use crate::source::{AudioByteSource, TrackMetadataStore};
use crate::state::SharedState;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ytmp_common::events::{PlayerEvent, RepeatMode};
use ytmp_common::TrackId;

/// Coordinator tuning
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub target_lufs: f64,
    pub tick_interval: Duration,
    pub waveform_bar_width_px: u32,
    /// Visualizer width before the view reports one
    pub initial_width_px: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            target_lufs: -14.0,
            tick_interval: Duration::from_millis(16),
            waveform_bar_width_px: 3,
            initial_width_px: 600,
        }
    }
}

/// Mutable coordinator state, guarded by one lock
struct Slot {
    session: Option<PlaybackSession>,
    selected: Option<TrackId>,
    queue: Vec<TrackId>,
    shuffle: bool,
    /// Tracks whose payload failed to decode; never auto-advanced to
    failed_decode: HashSet<TrackId>,
    poller: Option<JoinHandle<()>>,
    visible_width_px: u32,
}

impl Slot {
    /// Close the current session and forget its poller
    fn retire(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        // The poller notices the missing session within one tick
        self.poller = None;
    }

    /// Next track after `current` per the queue order and shuffle flag
    fn pick_next(&self, current: &TrackId) -> Option<TrackId> {
        let playable: Vec<&TrackId> = self
            .queue
            .iter()
            .filter(|id| !self.failed_decode.contains(*id))
            .collect();

        if self.shuffle {
            let others: Vec<&TrackId> = playable.iter().copied().filter(|id| *id != current).collect();
            return match others.choose(&mut rand::thread_rng()) {
                Some(id) => Some((*id).clone()),
                None => playable.first().map(|id| (*id).clone()),
            };
        }

        let len = self.queue.len();
        let start = self
            .queue
            .iter()
            .position(|id| id == current)
            .map_or(0, |pos| pos + 1);

        (0..len)
            .map(|i| &self.queue[(start + i) % len])
            .find(|id| !self.failed_decode.contains(*id))
            .cloned()
    }
}

struct Inner {
    deps: SessionDeps,
    state: Arc<SharedState>,
    config: CoordinatorConfig,
    slot: Mutex<Slot>,
    /// Held for the whole of every session create
    create_lock: Mutex<()>,
}

impl Inner {
    fn is_superseded(&self, generation: u64) -> bool {
        self.deps.latest_generation.load(Ordering::SeqCst) != generation
    }
}

#[async_trait]
impl ProgressSource for Inner {
    async fn probe(&self, generation: u64) -> Result<PollTarget> {
        if self.is_superseded(generation) {
            return Ok(PollTarget::Superseded);
        }

        let slot = self.slot.lock().await;
        let Some(session) = slot.session.as_ref() else {
            return Ok(PollTarget::Gone);
        };
        if session.generation() != generation {
            return Ok(PollTarget::Superseded);
        }
        if session.state() != SessionState::Running {
            return Ok(PollTarget::NotRunning(session.state()));
        }

        session.check_health()?;

        Ok(match session.current_offset_seconds() {
            Some(offset_seconds) => PollTarget::Playing {
                offset_seconds,
                duration_seconds: session.duration_seconds(),
            },
            None => PollTarget::NotRunning(session.state()),
        })
    }
}

/// Cloneable handle to the coordinator
#[derive(Clone)]
pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
}

impl PlaybackCoordinator {
    /// Create the coordinator and start its signal task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        bytes: Arc<dyn AudioByteSource>,
        catalog: Arc<dyn TrackMetadataStore>,
        state: Arc<SharedState>,
        config: CoordinatorConfig,
    ) -> Self {
        let (signals, signal_rx) = unbounded_channel();
        let visible_width_px = config.initial_width_px;

        let inner = Arc::new(Inner {
            deps: SessionDeps {
                backend,
                bytes,
                catalog,
                signals,
                latest_generation: Arc::new(AtomicU64::new(0)),
            },
            state,
            config,
            slot: Mutex::new(Slot {
                session: None,
                selected: None,
                queue: Vec::new(),
                shuffle: false,
                failed_decode: HashSet::new(),
                poller: None,
                visible_width_px,
            }),
            create_lock: Mutex::new(()),
        });

        tokio::spawn(Self::signal_loop(Arc::downgrade(&inner), signal_rx));
        info!("Playback coordinator started ({})", inner.deps.backend.name());

        Self { inner }
    }

    async fn signal_loop(inner: Weak<Inner>, mut rx: UnboundedReceiver<SessionSignal>) {
        while let Some(signal) = rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            PlaybackCoordinator { inner }.handle_signal(signal).await;
        }
        debug!("Coordinator signal loop stopped");
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.inner.state
    }

    fn next_generation(&self) -> u64 {
        self.inner.deps.latest_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Replace whatever is playing with `track_id` from the beginning
    pub async fn select_track(&self, track_id: TrackId) -> Result<()> {
        self.start_track(track_id, StartAt::BEGINNING).await
    }

    /// Replace whatever is playing with `track_id` starting at `start`.
    ///
    /// Returns `Ok(())` without side effects when a newer request
    /// supersedes this one.
    pub async fn start_track(&self, track_id: TrackId, start: StartAt) -> Result<()> {
        let generation = self.next_generation();
        let _create = self.inner.create_lock.lock().await;
        self.create_locked(generation, track_id, start).await
    }

    /// Create and install a session. Caller holds the create lock.
    async fn create_locked(&self, generation: u64, track_id: TrackId, start: StartAt) -> Result<()> {
        if self.inner.is_superseded(generation) {
            debug!("Create {} for {} superseded before start", generation, track_id);
            return Ok(());
        }

        {
            let mut slot = self.inner.slot.lock().await;
            slot.retire();
            slot.selected = Some(track_id.clone());
        }

        let settings = self.session_settings().await;
        let result =
            PlaybackSession::create(&self.inner.deps, generation, &track_id, start, settings).await;
        self.install(generation, &track_id, result).await
    }

    async fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            target_lufs: self.inner.config.target_lufs,
            user_volume: self.inner.state.volume().await,
            loop_single: self.inner.state.repeat_mode().await == RepeatMode::Single,
        }
    }

    /// Install a freshly created session, or discard it if superseded
    async fn install(
        &self,
        generation: u64,
        track_id: &TrackId,
        result: Result<PlaybackSession>,
    ) -> Result<()> {
        let mut session = match result {
            Ok(session) => session,
            Err(e) if self.inner.is_superseded(generation) => {
                debug!("Ignoring failure of superseded create {}: {}", generation, e);
                return Ok(());
            }
            Err(e) => {
                self.report_failure(Some(track_id.clone()), &e).await;
                return Err(e);
            }
        };

        // Repeat mode or volume may have changed while loading
        let settings = self.session_settings().await;
        session.set_loop_single(settings.loop_single);
        session.set_user_volume(settings.user_volume);

        let mut slot = self.inner.slot.lock().await;
        if self.inner.is_superseded(generation) {
            debug!("Create {} for {} finished late, closing it", generation, track_id);
            session.close();
            return Ok(());
        }

        let offset = session.start_offset_seconds();
        let duration = session.duration_seconds();
        let gain = session.gain();
        let buffer = session.buffer();

        slot.retire();
        slot.failed_decode.remove(track_id);
        slot.session = Some(session);
        slot.poller = Some(self.spawn_poller(generation));
        let width = slot.visible_width_px;
        drop(slot);

        self.inner.state.set_playing(true).await;
        self.inner.state.publish_progress(offset, duration).await;
        self.inner.state.broadcast_event(PlayerEvent::TrackStarted {
            track_id: track_id.clone(),
            start_offset_seconds: offset,
            gain,
            timestamp: chrono::Utc::now(),
        });
        self.publish_waveform(generation, track_id, buffer, width).await;

        Ok(())
    }

    fn spawn_poller(&self, generation: u64) -> JoinHandle<()> {
        let source: Weak<dyn ProgressSource> = Arc::downgrade(&self.inner) as Weak<dyn ProgressSource>;
        ProgressPoller::new(
            source,
            Arc::clone(&self.inner.state),
            generation,
            self.inner.config.tick_interval,
        )
        .spawn(self.inner.deps.signals.clone())
    }

    /// Sample `buffer` for the visualizer and publish the bars, unless the
    /// session or the visible width changed while sampling
    async fn publish_waveform(
        &self,
        generation: u64,
        track_id: &TrackId,
        buffer: Arc<DecodedBuffer>,
        width_px: u32,
    ) {
        let bar_count = waveform::bar_count_for_width(width_px, self.inner.config.waveform_bar_width_px);
        let bars = match tokio::task::spawn_blocking(move || {
            waveform::sample(&buffer.channel(0), bar_count)
        })
        .await
        {
            Ok(bars) => bars,
            Err(e) => {
                warn!("Waveform sampling failed for {}: {}", track_id, e);
                return;
            }
        };

        let slot = self.inner.slot.lock().await;
        let current = slot.session.as_ref().map(PlaybackSession::generation);
        if current != Some(generation) || slot.visible_width_px != width_px {
            debug!("Dropping stale waveform for {} (session {})", track_id, generation);
            return;
        }

        let bar_count = bars.len();
        self.inner.state.set_waveform(bars).await;
        drop(slot);

        self.inner.state.broadcast_event(PlayerEvent::WaveformUpdated {
            track_id: track_id.clone(),
            bar_count,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Log, flag not-playing, and broadcast a failure
    async fn report_failure(&self, track_id: Option<TrackId>, error: &Error) {
        warn!("Playback failed: {}", error);

        if let Error::Decode { track_id, .. } = error {
            self.inner.slot.lock().await.failed_decode.insert(track_id.clone());
        }

        self.inner.state.set_playing(false).await;
        self.inner.state.broadcast_event(PlayerEvent::PlaybackFailed {
            track_id,
            message: error.to_string(),
            retryable: error.is_retryable(),
            timestamp: chrono::Utc::now(),
        });
    }

    /// Pause or resume; after the session ended or closed, replay the
    /// selected track from the beginning with a new session.
    ///
    /// Ignored while a create is in flight.
    pub async fn toggle_play_pause(&self) -> Result<()> {
        let Ok(create_guard) = self.inner.create_lock.try_lock() else {
            debug!("Toggle ignored: session is loading");
            return Ok(());
        };

        let mut slot = self.inner.slot.lock().await;
        let outcome = match slot.session.as_mut() {
            Some(session) if !session.state().is_terminal() => {
                Some((session.generation(), session.toggle_play_pause()))
            }
            _ => None,
        };

        match outcome {
            Some((generation, Ok(SessionState::Running))) => {
                if slot.poller.as_ref().map_or(true, |poller| poller.is_finished()) {
                    slot.poller = Some(self.spawn_poller(generation));
                }
                drop(slot);
                self.inner.state.set_playing(true).await;
                Ok(())
            }
            Some((_, Ok(_))) => {
                drop(slot);
                self.inner.state.set_playing(false).await;
                Ok(())
            }
            Some((_, Err(e))) => {
                let track_id = slot.selected.clone();
                slot.retire();
                drop(slot);
                self.report_failure(track_id, &e).await;
                Err(e)
            }
            None => {
                let Some(track_id) = slot.selected.clone() else {
                    return Err(Error::InvalidState("no track selected".to_string()));
                };
                slot.retire();
                drop(slot);
                drop(create_guard);
                self.start_track(track_id, StartAt::BEGINNING).await
            }
        }
    }

    /// Restart the current track at `fraction` of its duration.
    ///
    /// With no live session, starts the selected track there instead.
    pub async fn seek(&self, fraction: f64) -> Result<()> {
        if !fraction.is_finite() {
            return Err(Error::InvalidInput(format!("seek position {}", fraction)));
        }

        let generation = self.next_generation();
        let _create = self.inner.create_lock.lock().await;
        if self.inner.is_superseded(generation) {
            return Ok(());
        }

        let (current, selected) = {
            let mut slot = self.inner.slot.lock().await;
            slot.poller = None;
            (slot.session.take(), slot.selected.clone())
        };

        match (current, selected) {
            (Some(mut session), _) => {
                let track_id = session.track_id().clone();
                debug!("Seek {} to {:.3} of {}", generation, fraction, track_id);
                let result = session.seek(fraction, &self.inner.deps, generation).await;
                drop(session);
                self.install(generation, &track_id, result).await
            }
            (None, Some(track_id)) => {
                self.create_locked(generation, track_id, StartAt::Fraction(fraction))
                    .await
            }
            (None, None) => Ok(()),
        }
    }

    pub async fn set_queue(&self, queue: Vec<TrackId>) {
        debug!("Queue set: {} tracks", queue.len());
        self.inner.slot.lock().await.queue = queue;
    }

    pub async fn queue(&self) -> Vec<TrackId> {
        self.inner.slot.lock().await.queue.clone()
    }

    /// Store the repeat mode; the live session loops only in `Single`
    pub async fn set_repeat_mode(&self, mode: RepeatMode) {
        self.inner.state.set_repeat_mode(mode).await;
        if let Some(session) = self.inner.slot.lock().await.session.as_mut() {
            session.set_loop_single(mode == RepeatMode::Single);
        }

        info!("Repeat mode: {}", mode);
        self.inner.state.broadcast_event(PlayerEvent::RepeatModeChanged {
            repeat_mode: mode,
            timestamp: chrono::Utc::now(),
        });
    }

    /// Flip shuffle, returning the new value
    pub async fn toggle_shuffle(&self) -> bool {
        let shuffle = {
            let mut slot = self.inner.slot.lock().await;
            slot.shuffle = !slot.shuffle;
            slot.shuffle
        };

        info!("Shuffle: {}", shuffle);
        self.inner.state.broadcast_event(PlayerEvent::ShuffleChanged {
            shuffle,
            timestamp: chrono::Utc::now(),
        });
        shuffle
    }

    pub async fn shuffle(&self) -> bool {
        self.inner.slot.lock().await.shuffle
    }

    /// Change the user volume multiplier and reapply gain without rebuilding
    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        if !volume.is_finite() || volume <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "volume must be a positive number, got {}",
                volume
            )));
        }

        self.inner.state.set_volume(volume).await;
        if let Some(session) = self.inner.slot.lock().await.session.as_mut() {
            session.set_user_volume(volume);
        }

        self.inner.state.broadcast_event(PlayerEvent::VolumeChanged {
            volume,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Visualizer width changed; resample the current track's bars
    pub async fn set_visible_width(&self, width_px: u32) {
        let current = {
            let mut slot = self.inner.slot.lock().await;
            slot.visible_width_px = width_px;
            slot.session.as_ref().map(|session| {
                (session.generation(), session.track_id().clone(), session.buffer())
            })
        };

        if let Some((generation, track_id, buffer)) = current {
            self.publish_waveform(generation, &track_id, buffer, width_px).await;
        }
    }

    pub async fn current_offset_seconds(&self) -> Option<f64> {
        self.inner
            .slot
            .lock()
            .await
            .session
            .as_ref()
            .and_then(PlaybackSession::current_offset_seconds)
    }

    pub async fn current_duration(&self) -> Option<f64> {
        self.inner
            .slot
            .lock()
            .await
            .session
            .as_ref()
            .map(PlaybackSession::duration_seconds)
    }

    pub async fn current_gain(&self) -> Option<f64> {
        self.inner
            .slot
            .lock()
            .await
            .session
            .as_ref()
            .map(PlaybackSession::gain)
    }

    /// The user's current selection (may have no live session)
    pub async fn current_track(&self) -> Option<TrackId> {
        self.inner.slot.lock().await.selected.clone()
    }

    pub async fn has_session(&self) -> bool {
        self.inner.slot.lock().await.session.is_some()
    }

    /// State of the live session, `Loading` while a create is in flight
    pub async fn session_state(&self) -> Option<SessionState> {
        if self.inner.create_lock.try_lock().is_err() {
            return Some(SessionState::Loading);
        }
        self.inner
            .slot
            .lock()
            .await
            .session
            .as_ref()
            .map(PlaybackSession::state)
    }

    /// Release everything. In-flight creates close their result.
    pub async fn shutdown(&self) {
        self.next_generation();
        self.inner.slot.lock().await.retire();
        self.inner.state.set_playing(false).await;
        info!("Playback coordinator shut down");
    }

    async fn handle_signal(&self, signal: SessionSignal) {
        match signal {
            SessionSignal::EndOfStream { generation } => self.on_end_of_stream(generation).await,
            SessionSignal::PollerFailed { generation, error } => {
                let track_id = {
                    let mut slot = self.inner.slot.lock().await;
                    match slot.session.as_ref() {
                        Some(session) if session.generation() == generation => {
                            let track_id = session.track_id().clone();
                            slot.retire();
                            Some(track_id)
                        }
                        _ => {
                            debug!("Dropping poller failure from stale session {}", generation);
                            return;
                        }
                    }
                };
                self.report_failure(track_id, &error).await;
            }
        }
    }

    async fn on_end_of_stream(&self, generation: u64) {
        let (track_id, next) = {
            let mut slot = self.inner.slot.lock().await;
            let current = match slot.session.as_mut() {
                Some(session)
                    if session.generation() == generation
                        && !self.inner.is_superseded(generation) =>
                {
                    session.mark_ended();
                    session.track_id().clone()
                }
                _ => {
                    debug!("Ignoring end of stale session {}", generation);
                    return;
                }
            };
            slot.retire();
            let next = slot.pick_next(&current);
            (current, next)
        };

        let mode = self.inner.state.repeat_mode().await;
        info!("Track {} ended (repeat {})", track_id, mode);
        self.inner.state.broadcast_event(PlayerEvent::TrackEnded {
            track_id: track_id.clone(),
            repeat_mode: mode,
            timestamp: chrono::Utc::now(),
        });

        let restart = match mode {
            RepeatMode::Off => None,
            RepeatMode::All => next,
            // Native looping normally keeps this from firing
            RepeatMode::Single => Some(track_id),
        };

        match restart {
            Some(next_id) => {
                if let Err(e) = self.start_track(next_id, StartAt::BEGINNING).await {
                    debug!("Advance after end of stream failed: {}", e);
                }
            }
            None => self.stop_if_current(generation).await,
        }
    }

    /// Clear the playing flag unless a newer request has taken over.
    ///
    /// The check and the write happen under the slot lock, so an install
    /// that follows always writes its own flag afterwards.
    async fn stop_if_current(&self, generation: u64) {
        let _slot = self.inner.slot.lock().await;
        if self.inner.is_superseded(generation) {
            debug!("Stop after end of {} skipped: superseded", generation);
            return;
        }
        self.inner.state.set_playing(false).await;
    }
}
