//! Error types for ytmp-ap
//!
//! Every failure that terminates a session is one of these variants. The
//! coordinator is the only place that turns them into user-visible messages.

use thiserror::Error;
use ytmp_common::TrackId;

/// Main error type for the playback core
#[derive(Error, Debug)]
pub enum Error {
    /// Byte source unreachable or track id unknown (transient, retryable)
    #[error("Fetch failed for track {track_id}: {reason}")]
    Fetch { track_id: TrackId, reason: String },

    /// Payload is not decodable audio (not retryable for this track)
    #[error("Audio decode error for track {track_id}: {reason}")]
    Decode { track_id: TrackId, reason: String },

    /// Platform refused to allocate another output graph
    #[error("Audio output unavailable: {0}")]
    ResourceExhausted(String),

    /// A live output graph failed a transport operation or reported a stream error
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Transport call on a session whose output resource was already released
    #[error("Session is closed")]
    SessionClosed,

    /// A newer request replaced this session before it opened any output
    #[error("Session {0} superseded by a newer request")]
    Superseded(u64),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors bubbled up from ytmp-common
    #[error(transparent)]
    Common(#[from] ytmp_common::Error),
}

impl Error {
    pub fn fetch(track_id: &TrackId, reason: impl Into<String>) -> Self {
        Error::Fetch {
            track_id: track_id.clone(),
            reason: reason.into(),
        }
    }

    pub fn decode(track_id: &TrackId, reason: impl Into<String>) -> Self {
        Error::Decode {
            track_id: track_id.clone(),
            reason: reason.into(),
        }
    }

    /// Whether asking again for the same track may succeed.
    ///
    /// Fetch failures and output hiccups are transient; decode failures and
    /// refused output allocations are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::AudioOutput(_))
    }
}

/// Convenience Result type using ytmp-ap Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        let id = TrackId::new("abc");
        assert!(Error::fetch(&id, "connection refused").is_retryable());
        assert!(!Error::decode(&id, "not audio").is_retryable());
        assert!(!Error::ResourceExhausted("no device".into()).is_retryable());
        assert!(Error::AudioOutput("stream error".into()).is_retryable());
        assert!(!Error::SessionClosed.is_retryable());
        assert!(!Error::Superseded(3).is_retryable());
    }

    #[test]
    fn test_messages_name_the_track() {
        let err = Error::decode(&TrackId::new("xyz"), "no audio track");
        assert_eq!(err.to_string(), "Audio decode error for track xyz: no audio track");
    }
}
