//! Audio test payload generation
//!
//! Builds deterministic WAV files in memory so tests can feed real,
//! decodable payloads through the byte source.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::io::Cursor;

/// Low rate keeps decode fast in tests
pub const TEST_SAMPLE_RATE: u32 = 8000;

/// 16-bit PCM sine wave, identical on every channel
pub fn sine_wav_bytes(
    duration_ms: u64,
    sample_rate: u32,
    channels: u16,
    frequency_hz: f32,
    amplitude: f32,
) -> Vec<u8> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec).expect("wav header");
        let total_frames = sample_rate as u64 * duration_ms / 1000;
        for i in 0..total_frames {
            let t = i as f32 / sample_rate as f32;
            let sample = (2.0 * PI * frequency_hz * t).sin() * amplitude;
            let value = (sample * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(value).expect("wav sample");
            }
        }
        writer.finalize().expect("wav finalize");
    }

    cursor.into_inner()
}

/// Silent 16-bit PCM
pub fn silent_wav_bytes(duration_ms: u64, sample_rate: u32, channels: u16) -> Vec<u8> {
    sine_wav_bytes(duration_ms, sample_rate, channels, 0.0, 0.0)
}
