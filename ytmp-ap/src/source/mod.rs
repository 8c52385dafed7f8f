//! Track byte and metadata sources
//!
//! The playback core never talks to the network or the filesystem directly.
//! It asks an `AudioByteSource` for a track's encoded bytes and a
//! `TrackMetadataStore` for its duration and loudness.

pub mod catalog;
pub mod file;
pub mod http;

use crate::audio::decoder::AudioPayload;
use crate::error::Result;
use async_trait::async_trait;
use ytmp_common::{Track, TrackId};

pub use catalog::InMemoryCatalog;
pub use file::FileAudioSource;
pub use http::HttpAudioSource;

/// Supplies the complete encoded audio for a track
#[async_trait]
pub trait AudioByteSource: Send + Sync {
    /// Fetch every byte of the track's audio.
    ///
    /// # Errors
    /// `Error::Fetch` when the source is unreachable or the id is unknown.
    async fn fetch_audio_bytes(&self, track_id: &TrackId) -> Result<AudioPayload>;
}

/// Supplies per-track metadata
#[async_trait]
pub trait TrackMetadataStore: Send + Sync {
    /// Look up a track.
    ///
    /// # Errors
    /// `Error::Fetch` when the id is unknown.
    async fn track(&self, track_id: &TrackId) -> Result<Track>;
}

/// Map a MIME type to the container extension symphonia probes best with
pub(crate) fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
    match mime.as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" | "audio/aac" => Some("m4a"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/webm" => Some("webm"),
        _ => None,
    }
}
