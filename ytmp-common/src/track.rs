//! Track metadata as supplied by the external metadata store
//!
//! The playback core only ever reads these values, once per session creation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque track identifier (YouTube video id, database key, file stem, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Read-only track metadata
///
/// Field names follow the metadata store's JSON representation
/// (`{"id": ..., "durationSeconds": ..., "loudnessLufs": ...}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,

    /// Duration reported by the metadata store (seconds)
    pub duration_seconds: f64,

    /// Measured integrated loudness, when the track has been analyzed
    #[serde(default)]
    pub loudness_lufs: Option<f64>,
}

impl Track {
    pub fn new(id: impl Into<TrackId>, duration_seconds: f64, loudness_lufs: Option<f64>) -> Self {
        Self {
            id: id.into(),
            duration_seconds,
            loudness_lufs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_deserializes_store_json() {
        let json = r#"{"id":"dQw4w9WgXcQ","durationSeconds":213.5,"loudnessLufs":-9.2}"#;
        let track: Track = serde_json::from_str(json).unwrap();

        assert_eq!(track.id, TrackId::new("dQw4w9WgXcQ"));
        assert_eq!(track.duration_seconds, 213.5);
        assert_eq!(track.loudness_lufs, Some(-9.2));
    }

    #[test]
    fn test_track_loudness_defaults_to_none() {
        let json = r#"{"id":"abc","durationSeconds":60}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert!(track.loudness_lufs.is_none());

        let json = r#"{"id":"abc","durationSeconds":60,"loudnessLufs":null}"#;
        let track: Track = serde_json::from_str(json).unwrap();
        assert!(track.loudness_lufs.is_none());
    }

    #[test]
    fn test_track_id_display() {
        assert_eq!(TrackId::from("xyz").to_string(), "xyz");
    }
}
