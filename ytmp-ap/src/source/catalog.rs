//! In-memory track catalog
//!
//! Holds the metadata for every known track. Populated from a JSON manifest
//! (an array of `Track` objects) or built directly in tests.

use super::TrackMetadataStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;
use ytmp_common::{Track, TrackId};

#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    tracks: RwLock<HashMap<TrackId, Track>>,
    order: RwLock<Vec<TrackId>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let mut map = HashMap::new();
        let mut order = Vec::new();
        for track in tracks {
            if !map.contains_key(&track.id) {
                order.push(track.id.clone());
            }
            map.insert(track.id.clone(), track);
        }
        Self {
            tracks: RwLock::new(map),
            order: RwLock::new(order),
        }
    }

    /// Load a JSON manifest: `[{"id": "...", "durationSeconds": 212.4, "loudnessLufs": -9.1}, ...]`
    pub async fn load_manifest(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let tracks: Vec<Track> = serde_json::from_str(&content).map_err(|e| {
            Error::Config(format!("Invalid track manifest {}: {}", path.display(), e))
        })?;

        info!("Loaded {} tracks from {}", tracks.len(), path.display());
        Ok(Self::from_tracks(tracks))
    }

    pub async fn insert(&self, track: Track) {
        let mut tracks = self.tracks.write().await;
        if !tracks.contains_key(&track.id) {
            self.order.write().await.push(track.id.clone());
        }
        tracks.insert(track.id.clone(), track);
    }

    /// Track ids in manifest order
    pub async fn track_ids(&self) -> Vec<TrackId> {
        self.order.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.order.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.order.read().await.is_empty()
    }
}

#[async_trait]
impl TrackMetadataStore for InMemoryCatalog {
    async fn track(&self, track_id: &TrackId) -> Result<Track> {
        self.tracks
            .read()
            .await
            .get(track_id)
            .cloned()
            .ok_or_else(|| Error::fetch(track_id, "unknown track id"))
    }
}
