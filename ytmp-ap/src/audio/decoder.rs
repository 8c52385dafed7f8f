//! Audio decoder using symphonia
//!
//! Decodes a complete in-memory payload (MP3, AAC/M4A, FLAC, Vorbis, WAV) to
//! interleaved stereo f32 PCM. Mono sources are duplicated to both channels;
//! sources with more than two channels keep their first two.

use crate::audio::types::DecodedBuffer;
use crate::error::{Error, Result};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};
use ytmp_common::TrackId;

/// Encoded audio as returned by a byte source
#[derive(Debug, Clone)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,

    /// Container extension hint (`"mp3"`, `"m4a"`, ...), when the source knows it
    pub extension: Option<String>,
}

impl AudioPayload {
    pub fn new(bytes: Vec<u8>, extension: Option<String>) -> Self {
        Self { bytes, extension }
    }
}

/// Output channel layout of every decoded buffer
pub const DECODED_CHANNELS: u16 = 2;

/// Whole-payload decoder.
pub struct SimpleDecoder;

impl SimpleDecoder {
    /// Decode an entire payload to PCM.
    ///
    /// This is CPU-bound; async callers run it on the blocking pool.
    ///
    /// # Errors
    /// `Error::Decode` when the payload is empty, not a recognised container,
    /// has no audio track, uses an unsupported codec, or yields no frames.
    pub fn decode_payload(track_id: &TrackId, payload: AudioPayload) -> Result<DecodedBuffer> {
        if payload.bytes.is_empty() {
            return Err(Error::decode(track_id, "empty payload"));
        }

        debug!(
            "Decoding track {} ({} bytes, hint={:?})",
            track_id,
            payload.bytes.len(),
            payload.extension
        );

        let mss = MediaSourceStream::new(Box::new(Cursor::new(payload.bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = payload.extension.as_deref() {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::decode(track_id, format!("Failed to probe format: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::decode(track_id, "No audio track found"))?;

        let stream_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::decode(track_id, format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();
        let mut scratch: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    debug!("Stream reset requested, stopping decode of {}", track_id);
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet for {}: {}", track_id, e);
                    break;
                }
            };

            if packet.track_id() != stream_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet: skip it, keep the rest of the stream
                    warn!("Skipping undecodable packet in {}: {}", track_id, e);
                    continue;
                }
                Err(e) => {
                    return Err(Error::decode(track_id, format!("Decoder failed: {}", e)));
                }
            };

            let spec = *decoded.spec();
            sample_rate.get_or_insert(spec.rate);
            let channels = spec.channels.count();

            let frames = decoded.capacity();
            if scratch.as_ref().map_or(true, |buf| buf.capacity() < frames * channels) {
                scratch = Some(SampleBuffer::<f32>::new(frames as u64, spec));
            }
            let Some(buf) = scratch.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            Self::fold_to_stereo(buf.samples(), channels, &mut samples);
        }

        let sample_rate = sample_rate
            .filter(|rate| *rate > 0)
            .ok_or_else(|| Error::decode(track_id, "Sample rate not found"))?;

        if samples.is_empty() {
            return Err(Error::decode(track_id, "No audio frames decoded"));
        }

        let buffer = DecodedBuffer::new(samples, sample_rate, DECODED_CHANNELS);
        debug!(
            "Decoded track {}: {} frames at {} Hz ({:.2}s)",
            track_id,
            buffer.frames(),
            sample_rate,
            buffer.duration_seconds()
        );

        Ok(buffer)
    }

    /// Append interleaved `channels`-wide samples to `output` as stereo pairs.
    fn fold_to_stereo(interleaved: &[f32], channels: usize, output: &mut Vec<f32>) {
        match channels {
            0 => {}
            1 => {
                output.reserve(interleaved.len() * 2);
                for &sample in interleaved {
                    output.push(sample);
                    output.push(sample);
                }
            }
            _ => {
                output.reserve(interleaved.len() / channels * 2);
                for frame in interleaved.chunks_exact(channels) {
                    output.push(frame[0]);
                    output.push(frame[1]);
                }
            }
        }
    }
}
