//! Waveform summary for the progress bar
//!
//! Reduces a decoded channel to a fixed number of bars, each the mean
//! absolute amplitude of its chunk, peak-normalised to [0, 1].

/// Number of bars that fit in `width_px` at `bar_width_px` per bar (at least 1)
pub fn bar_count_for_width(width_px: u32, bar_width_px: u32) -> usize {
    (width_px / bar_width_px.max(1)).max(1) as usize
}

/// Sample `pcm` into `bar_count` normalised bars.
///
/// Chunks are `ceil(len / bar_count)` samples wide, so the final chunk may
/// be short and fewer than `bar_count` bars come back for short inputs.
/// Non-finite samples count as silence. All bars are zero when the input
/// is silent.
pub fn sample(pcm: &[f32], bar_count: usize) -> Vec<f32> {
    if pcm.is_empty() || bar_count == 0 {
        return Vec::new();
    }

    let chunk_size = pcm.len().div_ceil(bar_count);
    let bars: Vec<f64> = pcm
        .chunks(chunk_size)
        .map(|chunk| {
            let sum: f64 = chunk
                .iter()
                .map(|s| if s.is_finite() { s.abs() as f64 } else { 0.0 })
                .sum();
            sum / chunk.len() as f64
        })
        .collect();

    let peak = bars.iter().copied().fold(0.0f64, f64::max);
    if peak <= 0.0 || !peak.is_finite() {
        return vec![0.0; bars.len()];
    }

    bars.into_iter().map(|bar| (bar / peak) as f32).collect()
}
