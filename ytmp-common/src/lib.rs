//! # YTMP Common Library
//!
//! Shared code for the YTMP player crates:
//! - Track metadata types consumed by the playback core
//! - Event types (PlayerEvent enum) and the EventBus
//! - Configuration file loading and path resolution
//! - Clock label formatting for the progress display

pub mod config;
pub mod error;
pub mod events;
pub mod human_time;
pub mod track;

pub use error::{Error, Result};
pub use events::{EventBus, PlaybackState, PlayerEvent, RepeatMode};
pub use track::{Track, TrackId};
