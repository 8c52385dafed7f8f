//! In-memory audio byte source

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use ytmp_ap::audio::AudioPayload;
use ytmp_ap::source::AudioByteSource;
use ytmp_ap::{Error, Result};
use ytmp_common::TrackId;

#[derive(Default)]
pub struct MemoryByteSource {
    payloads: Mutex<HashMap<TrackId, Vec<u8>>>,
    delays: Mutex<HashMap<TrackId, Duration>>,
    fetches: AtomicUsize,
}

impl MemoryByteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<TrackId>, bytes: Vec<u8>) {
        self.payloads.lock().unwrap().insert(id.into(), bytes);
    }

    pub fn remove(&self, id: impl Into<TrackId>) {
        self.payloads.lock().unwrap().remove(&id.into());
    }

    /// Make every fetch of `id` take `delay`
    pub fn set_delay(&self, id: impl Into<TrackId>, delay: Duration) {
        self.delays.lock().unwrap().insert(id.into(), delay);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioByteSource for MemoryByteSource {
    async fn fetch_audio_bytes(&self, track_id: &TrackId) -> Result<AudioPayload> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(track_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let bytes = self.payloads.lock().unwrap().get(track_id).cloned();
        bytes
            .map(|bytes| AudioPayload::new(bytes, Some("wav".to_string())))
            .ok_or_else(|| Error::fetch(track_id, "not in memory source"))
    }
}
