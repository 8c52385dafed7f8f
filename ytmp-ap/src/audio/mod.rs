//! Audio subsystem: decode, resample, and output
//!
//! - `decoder`: whole-payload symphonia decode to stereo f32
//! - `resampler`: rubato conversion to the device rate
//! - `output`: output graph seam and the cpal backend
//! - `types`: shared PCM buffer and frame types

pub mod decoder;
pub mod output;
pub mod resampler;
pub mod types;

pub use decoder::{AudioPayload, SimpleDecoder};
pub use output::{AudioBackend, CpalBackend, EndNotifier, GraphRequest, OutputGraph};
pub use resampler::Resampler;
pub use types::{AudioFrame, DecodedBuffer};
