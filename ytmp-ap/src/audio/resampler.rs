//! Audio resampling using rubato
//!
//! Output devices rarely run at the decoded rate of a web audio payload
//! (44.1 kHz MP3 vs. a 48 kHz device). The cpal backend converts the whole
//! decoded buffer once, when the output graph is built.

use crate::audio::types::DecodedBuffer;
use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Whole-buffer sample rate converter.
pub struct Resampler;

impl Resampler {
    /// Convert `buffer` to `output_rate`.
    ///
    /// Returns a copy when the rates already match or the buffer is empty.
    pub fn to_rate(buffer: &DecodedBuffer, output_rate: u32) -> Result<DecodedBuffer> {
        let input_rate = buffer.sample_rate();
        let channels = buffer.channels();

        if input_rate == output_rate || buffer.is_empty() {
            return Ok(DecodedBuffer::new(buffer.samples().to_vec(), output_rate, channels));
        }

        debug!(
            "Resampling from {}Hz to {}Hz ({} channels, {} frames)",
            input_rate,
            output_rate,
            channels,
            buffer.frames()
        );

        let planar_input = Self::deinterleave(buffer.samples(), channels);
        let input_frames = planar_input[0].len();

        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            channels as usize,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to create resampler: {}", e)))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::AudioOutput(format!("Resampling failed: {}", e)))?;

        let interleaved = Self::interleave(planar_output);
        debug!(
            "Resampled {} input frames to {} output frames",
            input_frames,
            interleaved.len() / channels as usize
        );

        Ok(DecodedBuffer::new(interleaved, output_rate, channels))
    }

    /// [L, R, L, R, ...] → [[L, L, ...], [R, R, ...]]
    fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
        let num_channels = channels.max(1) as usize;
        let num_frames = samples.len() / num_channels;
        let mut planar = vec![Vec::with_capacity(num_frames); num_channels];

        for frame in samples.chunks_exact(num_channels) {
            for (channel, sample) in planar.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        planar
    }

    /// [[L, L, ...], [R, R, ...]] → [L, R, L, R, ...]
    fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
        let Some(first) = planar.first() else {
            return Vec::new();
        };

        let num_frames = first.len();
        let mut interleaved = Vec::with_capacity(num_frames * planar.len());
        for frame_idx in 0..num_frames {
            for channel in &planar {
                interleaved.push(channel.get(frame_idx).copied().unwrap_or(0.0));
            }
        }

        interleaved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave_interleave() {
        let planar = Resampler::deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2);
        assert_eq!(planar, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
        assert_eq!(Resampler::interleave(planar), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert!(Resampler::interleave(Vec::new()).is_empty());
    }

    #[test]
    fn test_same_rate_is_copy() {
        let buffer = DecodedBuffer::new(vec![0.1, 0.2, 0.3, 0.4], 48000, 2);
        let out = Resampler::to_rate(&buffer, 48000).unwrap();
        assert_eq!(out.samples(), buffer.samples());
        assert_eq!(out.sample_rate(), 48000);
    }

    #[test]
    fn test_resample_changes_frame_count() {
        let input_rate = 44100;
        let frames = 4410;
        let mut samples = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            let t = i as f32 / input_rate as f32;
            let s = (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.5;
            samples.push(s);
            samples.push(s);
        }
        let buffer = DecodedBuffer::new(samples, input_rate, 2);

        let out = Resampler::to_rate(&buffer, 48000).unwrap();
        let expected = (frames as f64 * 48000.0 / 44100.0) as usize;

        assert_eq!(out.sample_rate(), 48000);
        assert!(
            out.frames() + 20 >= expected && out.frames() <= expected + 20,
            "Expected ~{} frames, got {}",
            expected,
            out.frames()
        );
    }
}
