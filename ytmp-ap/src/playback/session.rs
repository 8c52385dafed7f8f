//! Playback session
//!
//! One session owns one decode → gain → output pipeline for one track.
//!
//! ```text
//! Loading ──► Running ◄──► Suspended
//!    │           │             │
//!    │           ▼             │
//!    │         Ended           │
//!    ▼           ▼             ▼
//!  Closed ◄──────┴─────────────┘
//! ```
//!
//! A closed output graph cannot be restarted. Seeking and playing again
//! after `Closed`/`Ended` always build a new session.

use crate::audio::decoder::SimpleDecoder;
use crate::audio::output::{AudioBackend, EndNotifier, GraphRequest, OutputGraph};
use crate::audio::types::DecodedBuffer;
use crate::error::{Error, Result};
use crate::playback::gain;
use crate::source::{AudioByteSource, TrackMetadataStore};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use ytmp_common::{Track, TrackId};

/// Gap kept between the latest allowed start offset and the track end
const END_GUARD_SECONDS: f64 = 0.001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Fetch/decode in progress; no output resource yet
    Loading,
    /// Output graph connected and emitting
    Running,
    /// Graph retained but silent
    Suspended,
    /// Natural end of stream (terminal)
    Ended,
    /// Resources released (terminal)
    Closed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Ended | SessionState::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Loading => "loading",
            SessionState::Running => "running",
            SessionState::Suspended => "suspended",
            SessionState::Ended => "ended",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Asynchronous notifications routed to the coordinator
#[derive(Debug)]
pub enum SessionSignal {
    /// The session's output played its last frame (looping off)
    EndOfStream { generation: u64 },
    /// The progress poller observed a failure it cannot handle
    PollerFailed { generation: u64, error: Error },
}

/// Where a new session starts emitting
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StartAt {
    Seconds(f64),
    /// Fraction of the track duration, clamped to [0, 1]
    Fraction(f64),
}

impl StartAt {
    pub const BEGINNING: StartAt = StartAt::Seconds(0.0);

    /// Resolve to an offset in `[0, duration)`.
    ///
    /// Non-finite input resolves to 0. Positions at or past the end resolve
    /// to just under `duration`.
    pub fn resolve(self, duration_seconds: f64) -> f64 {
        let raw = match self {
            StartAt::Seconds(seconds) => seconds,
            StartAt::Fraction(fraction) => {
                if !fraction.is_finite() {
                    return 0.0;
                }
                fraction.clamp(0.0, 1.0) * duration_seconds
            }
        };

        if !raw.is_finite() || raw <= 0.0 || duration_seconds.is_nan() || duration_seconds <= 0.0 {
            return 0.0;
        }
        if raw >= duration_seconds {
            return (duration_seconds - END_GUARD_SECONDS).max(0.0);
        }
        raw
    }
}

/// Collaborators every session needs
#[derive(Clone)]
pub struct SessionDeps {
    pub backend: Arc<dyn AudioBackend>,
    pub bytes: Arc<dyn AudioByteSource>,
    pub catalog: Arc<dyn TrackMetadataStore>,
    pub signals: UnboundedSender<SessionSignal>,
    /// Generation of the newest session request. A create whose generation
    /// is older stops before opening an output graph.
    pub latest_generation: Arc<AtomicU64>,
}

impl SessionDeps {
    fn ensure_current(&self, generation: u64, track_id: &TrackId, stage: &str) -> Result<()> {
        let latest = self.latest_generation.load(Ordering::SeqCst);
        if latest > generation {
            debug!(
                "Session {} for {} superseded by {} {}",
                generation, track_id, latest, stage
            );
            return Err(Error::Superseded(generation));
        }
        Ok(())
    }
}

/// Per-session playback settings captured at creation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub target_lufs: f64,
    pub user_volume: f64,
    pub loop_single: bool,
}

pub struct PlaybackSession {
    generation: u64,
    track: Track,
    buffer: Arc<DecodedBuffer>,
    graph: Option<Box<dyn OutputGraph>>,
    gain: f64,
    start_offset_seconds: f64,
    duration_seconds: f64,
    settings: SessionSettings,
    state: SessionState,
}

impl PlaybackSession {
    /// Fetch, decode, and start emitting `track_id` from `start`.
    ///
    /// Suspends for the fetch and for the decode (run on the blocking pool).
    /// On success the session is `Running`. On failure nothing is left
    /// allocated.
    ///
    /// # Errors
    /// - `Error::Fetch` when metadata or bytes are unavailable
    /// - `Error::Decode` when the payload is not decodable audio
    /// - `Error::ResourceExhausted` when the output graph cannot be allocated
    /// - `Error::Superseded` when a newer request arrived first; nothing was
    ///   opened
    pub async fn create(
        deps: &SessionDeps,
        generation: u64,
        track_id: &TrackId,
        start: StartAt,
        settings: SessionSettings,
    ) -> Result<Self> {
        debug!("Session {} loading track {}", generation, track_id);
        deps.ensure_current(generation, track_id, "before fetch")?;

        let track = deps.catalog.track(track_id).await?;
        let payload = deps.bytes.fetch_audio_bytes(track_id).await?;
        deps.ensure_current(generation, track_id, "after fetch")?;

        let decode_id = track_id.clone();
        let buffer = tokio::task::spawn_blocking(move || {
            SimpleDecoder::decode_payload(&decode_id, payload)
        })
        .await
        .map_err(|e| Error::decode(track_id, format!("Decode task failed: {}", e)))??;
        let buffer = Arc::new(buffer);

        let duration_seconds = if track.duration_seconds.is_finite() && track.duration_seconds > 0.0 {
            track.duration_seconds
        } else {
            buffer.duration_seconds()
        };
        let start_offset_seconds = start.resolve(duration_seconds);
        let gain = gain::gain(track.loudness_lufs, settings.target_lufs, settings.user_volume);

        let request = GraphRequest {
            track_id: track_id.clone(),
            buffer: Arc::clone(&buffer),
            start_offset_seconds,
            gain: gain as f32,
            loop_single: settings.loop_single,
            on_end: EndNotifier::new(generation, deps.signals.clone()),
        };
        deps.ensure_current(generation, track_id, "after decode")?;
        let backend = Arc::clone(&deps.backend);
        let graph = tokio::task::spawn_blocking(move || backend.open(request))
            .await
            .map_err(|e| Error::ResourceExhausted(format!("Output task failed: {}", e)))??;

        info!(
            "Session {} running: track={} offset={:.2}s gain={:.3} loop={}",
            generation, track_id, start_offset_seconds, gain, settings.loop_single
        );

        Ok(Self {
            generation,
            track,
            buffer,
            graph: Some(graph),
            gain,
            start_offset_seconds,
            duration_seconds,
            settings,
            state: SessionState::Running,
        })
    }

    /// Running ⇄ Suspended.
    ///
    /// # Errors
    /// - `Error::SessionClosed` on an ended or closed session; the caller
    ///   must create a fresh session instead
    /// - `Error::AudioOutput` when the graph rejects the transition (the
    ///   session is closed before returning)
    pub fn toggle_play_pause(&mut self) -> Result<SessionState> {
        let next = match self.state {
            SessionState::Running => SessionState::Suspended,
            SessionState::Suspended => SessionState::Running,
            SessionState::Ended | SessionState::Closed => return Err(Error::SessionClosed),
            SessionState::Loading => {
                return Err(Error::InvalidState("session is still loading".to_string()))
            }
        };

        let graph = self.graph.as_mut().ok_or(Error::SessionClosed)?;
        let result = if next == SessionState::Suspended {
            graph.suspend()
        } else {
            graph.resume()
        };

        if let Err(e) = result {
            warn!("Session {} transport failed: {}", self.generation, e);
            self.close();
            return Err(e);
        }

        debug!("Session {} {} -> {}", self.generation, self.state, next);
        self.state = next;
        Ok(next)
    }

    /// Close this session and create its replacement at `fraction` of the track.
    ///
    /// The live graph's position is never moved; the new session starts
    /// from the requested offset.
    pub async fn seek(
        &mut self,
        fraction: f64,
        deps: &SessionDeps,
        generation: u64,
    ) -> Result<PlaybackSession> {
        if !fraction.is_finite() {
            return Err(Error::InvalidInput(format!("seek position {}", fraction)));
        }

        self.close();
        let start = StartAt::Seconds(fraction.clamp(0.0, 1.0) * self.duration_seconds);
        PlaybackSession::create(deps, generation, &self.track.id, start, self.settings).await
    }

    /// Toggle native looping; while on, end of stream never fires
    pub fn set_loop_single(&mut self, loop_single: bool) {
        self.settings.loop_single = loop_single;
        if let Some(graph) = self.graph.as_mut() {
            graph.set_looping(loop_single);
        }
    }

    /// Recompute the gain for a new user volume and apply it to the live graph
    pub fn set_user_volume(&mut self, user_volume: f64) {
        self.settings.user_volume = user_volume;
        self.gain = gain::gain(self.track.loudness_lufs, self.settings.target_lufs, user_volume);
        if let Some(graph) = self.graph.as_mut() {
            graph.set_gain(self.gain as f32);
        }
    }

    /// Natural end of stream reached
    pub fn mark_ended(&mut self) {
        if matches!(self.state, SessionState::Running | SessionState::Suspended) {
            debug!("Session {} ended naturally", self.generation);
            self.state = SessionState::Ended;
        }
    }

    /// Release the output graph. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut graph) = self.graph.take() {
            graph.close();
            debug!("Session {} closed (track {})", self.generation, self.track.id);
        }
        self.state = SessionState::Closed;
    }

    /// Surface any asynchronous output failure
    pub fn check_health(&self) -> Result<()> {
        match self.graph.as_ref() {
            Some(graph) => graph.check_health(),
            None => Ok(()),
        }
    }

    /// `(elapsed + start) mod duration`, while Running or Suspended
    pub fn current_offset_seconds(&self) -> Option<f64> {
        if !matches!(self.state, SessionState::Running | SessionState::Suspended) {
            return None;
        }
        let graph = self.graph.as_ref()?;
        let position = graph.elapsed_seconds() + self.start_offset_seconds;

        if self.duration_seconds > 0.0 {
            Some(position % self.duration_seconds)
        } else {
            Some(position)
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn track_id(&self) -> &TrackId {
        &self.track.id
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn buffer(&self) -> Arc<DecodedBuffer> {
        Arc::clone(&self.buffer)
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn start_offset_seconds(&self) -> f64 {
        self.start_offset_seconds
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn loop_single(&self) -> bool {
        self.settings.loop_single
    }

    pub fn state(&self) -> SessionState {
        self.state
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("generation", &self.generation)
            .field("track_id", &self.track.id)
            .field("state", &self.state)
            .field("gain", &self.gain)
            .field("start_offset_seconds", &self.start_offset_seconds)
            .field("duration_seconds", &self.duration_seconds)
            .field("loop_single", &self.settings.loop_single)
            .finish()
    }
}
