//! Scripted output backend
//!
//! Records every graph it opens and how many are alive at once. Tests drive
//! playback time and natural end-of-stream through `GraphProbe`.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use ytmp_ap::audio::{AudioBackend, EndNotifier, GraphRequest, OutputGraph};
use ytmp_ap::{Error, Result};
use ytmp_common::TrackId;

#[derive(Default)]
struct Counters {
    live: AtomicUsize,
    max_live: AtomicUsize,
    opened: AtomicUsize,
}

#[derive(Default)]
pub struct MockBackend {
    counters: Arc<Counters>,
    fail_next: AtomicBool,
    graphs: Mutex<Vec<Arc<GraphProbe>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next `open` with `ResourceExhausted`
    pub fn fail_next_open(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn live_graphs(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn max_live_graphs(&self) -> usize {
        self.counters.max_live.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn graphs(&self) -> Vec<Arc<GraphProbe>> {
        self.graphs.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Option<Arc<GraphProbe>> {
        self.graphs.lock().unwrap().last().cloned()
    }
}

impl AudioBackend for MockBackend {
    fn open(&self, request: GraphRequest) -> Result<Box<dyn OutputGraph>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::ResourceExhausted("mock device busy".to_string()));
        }

        let probe = Arc::new(GraphProbe {
            track_id: request.track_id,
            generation: request.on_end.generation(),
            start_offset_seconds: request.start_offset_seconds,
            gain_bits: AtomicU32::new(request.gain.to_bits()),
            looping: AtomicBool::new(request.loop_single),
            suspended: AtomicBool::new(false),
            closes: AtomicUsize::new(0),
            elapsed_bits: AtomicU64::new(0f64.to_bits()),
            unhealthy: AtomicBool::new(false),
            on_end: request.on_end,
        });

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);
        self.graphs.lock().unwrap().push(Arc::clone(&probe));

        Ok(Box::new(MockGraph {
            probe,
            counters: Arc::clone(&self.counters),
            closed: false,
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Test-side view of one opened graph
pub struct GraphProbe {
    pub track_id: TrackId,
    pub generation: u64,
    pub start_offset_seconds: f64,
    gain_bits: AtomicU32,
    looping: AtomicBool,
    suspended: AtomicBool,
    closes: AtomicUsize,
    elapsed_bits: AtomicU64,
    unhealthy: AtomicBool,
    on_end: EndNotifier,
}

impl GraphProbe {
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain_bits.load(Ordering::SeqCst))
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::SeqCst)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    /// Pretend `seconds` of audio have been emitted
    pub fn set_elapsed(&self, seconds: f64) {
        self.elapsed_bits.store(seconds.to_bits(), Ordering::SeqCst);
    }

    /// Report a stream error on the next health check
    pub fn fail_health(&self) {
        self.unhealthy.store(true, Ordering::SeqCst);
    }

    /// Reach the last frame. Looping graphs wrap instead; returns whether
    /// end-of-stream was signalled.
    pub fn play_to_end(&self) -> bool {
        if self.is_looping() || self.is_closed() {
            return false;
        }
        self.on_end.notify();
        true
    }
}

struct MockGraph {
    probe: Arc<GraphProbe>,
    counters: Arc<Counters>,
    closed: bool,
}

impl OutputGraph for MockGraph {
    fn suspend(&mut self) -> Result<()> {
        self.probe.suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.probe.suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn set_gain(&mut self, gain: f32) {
        self.probe.gain_bits.store(gain.to_bits(), Ordering::SeqCst);
    }

    fn set_looping(&mut self, looping: bool) {
        self.probe.looping.store(looping, Ordering::SeqCst);
    }

    fn elapsed_seconds(&self) -> f64 {
        f64::from_bits(self.probe.elapsed_bits.load(Ordering::SeqCst))
    }

    fn check_health(&self) -> Result<()> {
        if self.probe.unhealthy.swap(false, Ordering::SeqCst) {
            return Err(Error::AudioOutput("mock stream error".to_string()));
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Drop for MockGraph {
    fn drop(&mut self) {
        self.close();
    }
}
