//! Audio output graphs
//!
//! An output graph is the platform resource a playback session renders
//! through: it is built once with a fixed start offset, can be suspended and
//! resumed, and is torn down exactly once. A torn-down graph cannot be
//! restarted; playing again means building a new one.
//!
//! `AudioBackend` / `OutputGraph` are the seam between the session state
//! machine and the platform. `CpalBackend` is the production implementation.

use crate::audio::resampler::Resampler;
use crate::audio::types::{AudioFrame, DecodedBuffer};
use crate::error::{Error, Result};
use crate::playback::session::SessionSignal;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};
use ytmp_common::TrackId;

/// One-shot natural end-of-stream notification for a session.
///
/// Handed to the backend with each graph; the graph calls `notify` when the
/// last frame has been rendered and looping is off. Only the first call
/// delivers a signal.
#[derive(Debug, Clone)]
pub struct EndNotifier {
    generation: u64,
    tx: UnboundedSender<SessionSignal>,
    fired: Arc<AtomicBool>,
}

impl EndNotifier {
    pub fn new(generation: u64, tx: UnboundedSender<SessionSignal>) -> Self {
        Self {
            generation,
            tx,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver the end-of-stream signal (first call only).
    ///
    /// Safe to call from a real-time audio callback: never blocks.
    pub fn notify(&self) {
        if self.fired.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(SessionSignal::EndOfStream {
            generation: self.generation,
        });
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Everything a backend needs to build one output graph
#[derive(Debug, Clone)]
pub struct GraphRequest {
    pub track_id: TrackId,
    pub buffer: Arc<DecodedBuffer>,
    /// Where emission begins (seconds into the buffer)
    pub start_offset_seconds: f64,
    pub gain: f32,
    pub loop_single: bool,
    pub on_end: EndNotifier,
}

/// A live decode → gain → output routing resource
pub trait OutputGraph: Send {
    /// Silence output, keeping the graph and its position
    fn suspend(&mut self) -> Result<()>;

    /// Continue emitting from where `suspend` left off
    fn resume(&mut self) -> Result<()>;

    /// Replace the gain stage multiplier without rebuilding the graph
    fn set_gain(&mut self, gain: f32);

    /// Toggle native looping; while looping, end-of-stream never fires
    fn set_looping(&mut self, looping: bool);

    /// Seconds of audio emitted since the graph started (pauses while suspended)
    fn elapsed_seconds(&self) -> f64;

    /// Report any asynchronous stream failure observed since the last call
    fn check_health(&self) -> Result<()>;

    /// Disconnect the gain stage and release the platform resource.
    ///
    /// Must be idempotent.
    fn close(&mut self);
}

/// Factory for output graphs
pub trait AudioBackend: Send + Sync {
    /// Allocate a graph and begin emitting at `request.start_offset_seconds`.
    ///
    /// # Errors
    /// `Error::ResourceExhausted` when the platform refuses the allocation.
    /// Partially constructed resources are released before returning.
    fn open(&self, request: GraphRequest) -> Result<Box<dyn OutputGraph>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// State shared between a `CpalGraph` handle and its audio callback
struct GraphShared {
    frames_rendered: AtomicU64,
    output_rate: AtomicU32,
    gain_bits: AtomicU32,
    looping: AtomicBool,
    error_flag: AtomicBool,
}

impl GraphShared {
    fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::Relaxed))
    }
}

enum GraphCommand {
    Suspend(mpsc::SyncSender<Result<()>>),
    Resume(mpsc::SyncSender<Result<()>>),
    Close,
}

/// Default-device cpal backend.
///
/// Each graph gets its own output stream, owned by a dedicated thread since
/// cpal streams cannot move between threads on every platform.
#[derive(Debug, Default, Clone)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn open(&self, request: GraphRequest) -> Result<Box<dyn OutputGraph>> {
        Ok(Box::new(CpalGraph::spawn(request)?))
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}

/// Handle to a cpal output stream running on its own thread
pub struct CpalGraph {
    track_id: TrackId,
    shared: Arc<GraphShared>,
    control: Option<mpsc::Sender<GraphCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl CpalGraph {
    fn spawn(request: GraphRequest) -> Result<Self> {
        let shared = Arc::new(GraphShared {
            frames_rendered: AtomicU64::new(0),
            output_rate: AtomicU32::new(0),
            gain_bits: AtomicU32::new(request.gain.to_bits()),
            looping: AtomicBool::new(request.loop_single),
            error_flag: AtomicBool::new(false),
        });

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<()>>(1);
        let (control_tx, control_rx) = mpsc::channel::<GraphCommand>();
        let track_id = request.track_id.clone();
        let thread_shared = Arc::clone(&shared);

        let worker = thread::Builder::new()
            .name(format!("ytmp-output-{}", request.on_end.generation()))
            .spawn(move || run_output_thread(request, thread_shared, control_rx, ready_tx))
            .map_err(|e| Error::ResourceExhausted(format!("Failed to spawn output thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Output graph started for track {}", track_id);
                Ok(Self {
                    track_id,
                    shared,
                    control: Some(control_tx),
                    worker: Some(worker),
                })
            }
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(Error::ResourceExhausted(
                    "Output thread exited during startup".to_string(),
                ))
            }
        }
    }

    fn request(&self, make: impl FnOnce(mpsc::SyncSender<Result<()>>) -> GraphCommand) -> Result<()> {
        let control = self.control.as_ref().ok_or(Error::SessionClosed)?;
        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        control
            .send(make(reply_tx))
            .map_err(|_| Error::AudioOutput("Output thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Output thread did not reply".to_string()))?
    }
}

impl OutputGraph for CpalGraph {
    fn suspend(&mut self) -> Result<()> {
        self.request(GraphCommand::Suspend)
    }

    fn resume(&mut self) -> Result<()> {
        self.request(GraphCommand::Resume)
    }

    fn set_gain(&mut self, gain: f32) {
        self.shared.gain_bits.store(gain.to_bits(), Ordering::Relaxed);
    }

    fn set_looping(&mut self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Relaxed);
    }

    fn elapsed_seconds(&self) -> f64 {
        let rate = self.shared.output_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0.0;
        }
        self.shared.frames_rendered.load(Ordering::Relaxed) as f64 / rate as f64
    }

    fn check_health(&self) -> Result<()> {
        if self.shared.error_flag.swap(false, Ordering::SeqCst) {
            return Err(Error::AudioOutput(format!(
                "Output stream for track {} reported an error",
                self.track_id
            )));
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(control) = self.control.take() {
            let _ = control.send(GraphCommand::Close);
        }
        if let Some(worker) = self.worker.take() {
            if join_off_runtime(move || worker.join()).is_err() {
                warn!("Output thread for track {} panicked", self.track_id);
            }
            debug!("Output graph released for track {}", self.track_id);
        }
    }
}

impl Drop for CpalGraph {
    fn drop(&mut self) {
        self.close();
    }
}

/// Run a blocking join without stalling other tasks on a multi-threaded
/// tokio worker. Plain call elsewhere (no runtime, current-thread runtime).
fn join_off_runtime<T>(join: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(join)
        }
        _ => join(),
    }
}

/// Output thread body: owns the stream until `Close` or handle drop
fn run_output_thread(
    request: GraphRequest,
    shared: Arc<GraphShared>,
    control_rx: mpsc::Receiver<GraphCommand>,
    ready_tx: mpsc::SyncSender<Result<()>>,
) {
    let stream = match build_stream(request, Arc::clone(&shared)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(Error::ResourceExhausted(format!(
            "Failed to start stream: {}",
            e
        ))));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while let Ok(command) = control_rx.recv() {
        match command {
            GraphCommand::Suspend(reply) => {
                let result = stream
                    .pause()
                    .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)));
                let _ = reply.send(result);
            }
            GraphCommand::Resume(reply) => {
                let result = stream
                    .play()
                    .map_err(|e| Error::AudioOutput(format!("Failed to resume stream: {}", e)));
                let _ = reply.send(result);
            }
            GraphCommand::Close => break,
        }
    }

    let _ = stream.pause();
    drop(stream);
}

fn build_stream(request: GraphRequest, shared: Arc<GraphShared>) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::ResourceExhausted("No default output device found".to_string()))?;

    let supported = device
        .default_output_config()
        .map_err(|e| Error::ResourceExhausted(format!("Failed to get default config: {}", e)))?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();
    let output_rate = config.sample_rate.0;

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        output_rate, config.channels, sample_format
    );

    let pcm = Resampler::to_rate(&request.buffer, output_rate)?;
    let start_frame = (request.start_offset_seconds.max(0.0) * output_rate as f64) as usize;
    shared.output_rate.store(output_rate, Ordering::Relaxed);

    let renderer = Renderer {
        frames: pcm.frames(),
        pcm,
        cursor: start_frame,
        shared: Arc::clone(&shared),
        on_end: request.on_end,
    };

    match sample_format {
        SampleFormat::F32 => build_typed_stream::<f32>(&device, &config, renderer, shared),
        SampleFormat::I16 => build_typed_stream::<i16>(&device, &config, renderer, shared),
        SampleFormat::U16 => build_typed_stream::<u16>(&device, &config, renderer, shared),
        other => Err(Error::ResourceExhausted(format!(
            "Unsupported sample format: {:?}",
            other
        ))),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut renderer: Renderer,
    shared: Arc<GraphShared>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                renderer.render(data, channels);
            },
            move |err| {
                error!("Audio stream error: {}", err);
                shared.error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| Error::ResourceExhausted(format!("Failed to build stream: {}", e)))
}

/// Audio-callback side of a graph: walks the buffer from the start offset
struct Renderer {
    pcm: DecodedBuffer,
    frames: usize,
    cursor: usize,
    shared: Arc<GraphShared>,
    on_end: EndNotifier,
}

impl Renderer {
    fn render<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: SizedSample + FromSample<f32>,
    {
        let gain = self.shared.gain();
        let looping = self.shared.looping.load(Ordering::Relaxed);
        let mut emitted = 0u64;

        for out in data.chunks_mut(channels.max(1)) {
            if self.cursor >= self.frames && looping && self.frames > 0 {
                self.cursor = 0;
            }

            let frame = if self.cursor < self.frames {
                let frame = self.pcm.frame(self.cursor).unwrap_or_else(AudioFrame::zero);
                self.cursor += 1;
                emitted += 1;
                frame.with_gain(gain)
            } else {
                self.on_end.notify();
                AudioFrame::zero()
            };

            match out {
                [mono] => *mono = T::from_sample((frame.left + frame.right) * 0.5),
                [left, right, rest @ ..] => {
                    *left = T::from_sample(frame.left);
                    *right = T::from_sample(frame.right);
                    for sample in rest {
                        *sample = T::EQUILIBRIUM;
                    }
                }
                [] => {}
            }
        }

        self.shared.frames_rendered.fetch_add(emitted, Ordering::Relaxed);
    }
}
