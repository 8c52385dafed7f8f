//! Loudness normalisation gain
//!
//! Tracks carry an integrated loudness measurement (LUFS). Playback scales
//! every track toward a common target so that consecutive tracks play at
//! roughly the same perceived level, then applies the listener's volume on top.

/// Linear gain multiplier for a track.
///
/// `10^((target_lufs - loudness_lufs) / 20) * user_volume`, or just
/// `user_volume` when the track has no loudness measurement.
///
/// # Examples
///
/// ```
/// use ytmp_ap::playback::gain::gain;
///
/// // A quiet track is boosted ~6 dB toward a -14 LUFS target
/// let g = gain(Some(-20.0), -14.0, 1.0);
/// assert!((g - 1.995).abs() < 0.001);
///
/// assert_eq!(gain(None, -14.0, 0.5), 0.5);
/// ```
pub fn gain(loudness_lufs: Option<f64>, target_lufs: f64, user_volume: f64) -> f64 {
    match loudness_lufs.filter(|l| l.is_finite()) {
        Some(loudness) => db_to_linear(target_lufs - loudness) * user_volume,
        None => user_volume,
    }
}

fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_track_is_boosted() {
        let g = gain(Some(-20.0), -14.0, 1.0);
        assert!((g - 1.9953).abs() < 1e-3, "got {}", g);
    }

    #[test]
    fn test_loud_track_is_attenuated() {
        let g = gain(Some(-8.0), -14.0, 1.0);
        assert!((g - 0.5012).abs() < 1e-3, "got {}", g);
    }

    #[test]
    fn test_on_target_is_user_volume() {
        assert!((gain(Some(-14.0), -14.0, 0.7) - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_missing_or_invalid_loudness_falls_back_to_user_volume() {
        assert_eq!(gain(None, -14.0, 1.0), 1.0);
        assert_eq!(gain(Some(f64::NAN), -14.0, 0.25), 0.25);
    }

    #[test]
    fn test_user_volume_scales_linearly() {
        let full = gain(Some(-20.0), -14.0, 1.0);
        let half = gain(Some(-20.0), -14.0, 0.5);
        assert!((full / 2.0 - half).abs() < 1e-12);
    }
}
