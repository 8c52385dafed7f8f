//! Core audio data types
//!
//! Defines the decoded PCM buffer shared by the playback session and the
//! waveform sampler, plus the per-frame type used by output rendering.

/// Decoded PCM for one track.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Interleaved: [L, R, L, R, ...] for stereo
/// - Sample rate and channel count fixed at decode time
///
/// The buffer is never mutated after decode. Sessions and the waveform
/// sampler share it through `Arc<DecodedBuffer>`.
#[derive(Debug)]
pub struct DecodedBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedBuffer {
    /// Wrap decoded samples.
    ///
    /// Trailing samples that do not form a whole frame are dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);

        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Extract a single channel as a contiguous sequence.
    ///
    /// Returns an empty vector for an out-of-range channel index.
    pub fn channel(&self, index: usize) -> Vec<f32> {
        let channels = self.channels as usize;
        if index >= channels {
            return Vec::new();
        }
        self.samples
            .chunks_exact(channels)
            .map(|frame| frame[index])
            .collect()
    }

    /// Frame at `frame_index`, folded to stereo
    pub fn frame(&self, frame_index: usize) -> Option<AudioFrame> {
        let channels = self.channels as usize;
        let start = frame_index.checked_mul(channels)?;
        let frame = self.samples.get(start..start + channels)?;
        Some(match frame {
            [mono] => AudioFrame::from_mono(*mono),
            [left, right, ..] => AudioFrame::from_stereo(*left, *right),
            [] => AudioFrame::zero(),
        })
    }
}

/// A single stereo sample (one frame of audio).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrame {
    pub left: f32,
    pub right: f32,
}

impl AudioFrame {
    pub fn zero() -> Self {
        AudioFrame { left: 0.0, right: 0.0 }
    }

    /// Duplicate a mono sample to both channels
    pub fn from_mono(sample: f32) -> Self {
        AudioFrame { left: sample, right: sample }
    }

    pub fn from_stereo(left: f32, right: f32) -> Self {
        AudioFrame { left, right }
    }

    /// Scale both channels and clamp to [-1.0, 1.0]
    pub fn with_gain(self, gain: f32) -> Self {
        AudioFrame {
            left: (self.left * gain).clamp(-1.0, 1.0),
            right: (self.right * gain).clamp(-1.0, 1.0),
        }
    }
}
