//! YTMP Audio Player library
//!
//! Playback core for the YTMP music player: decode a track's audio, route it
//! through a loudness-normalising gain stage to the output device, and keep
//! the UI playback state (progress, label, playing flag, repeat mode, volume)
//! up to date. Exactly one playback session is alive at a time.

pub mod audio;
pub mod config;
pub mod console;
pub mod error;
pub mod playback;
pub mod source;
pub mod state;

pub use error::{Error, Result};
pub use state::{SharedState, UiPlaybackState};
