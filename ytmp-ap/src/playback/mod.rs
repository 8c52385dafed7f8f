//! Playback engine
//!
//! `PlaybackCoordinator` owns the single live `PlaybackSession`; the
//! `ProgressPoller` republishes its position and `SeekController` turns
//! pointer gestures into seeks. `gain` and `waveform` are pure helpers.

pub mod coordinator;
pub mod gain;
pub mod poller;
pub mod seek;
pub mod session;
pub mod waveform;

pub use coordinator::{CoordinatorConfig, PlaybackCoordinator};
pub use poller::{PollExit, PollTarget, ProgressPoller, ProgressSource};
pub use seek::{SeekController, SliderBounds};
pub use session::{
    PlaybackSession, SessionDeps, SessionSettings, SessionSignal, SessionState, StartAt,
};
