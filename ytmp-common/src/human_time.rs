//! Clock-style time formatting for the transport display
//!
//! Provides the `M:SS` / `H:MM:SS` labels shown next to the progress slider.

/// Durations at or above this many seconds get an hours field
const HOURS_FORMAT_MIN: u64 = 3600;

/// Format a position in seconds as a clock label.
///
/// - Below one hour: `M:SS` (minutes not zero-padded)
/// - One hour and above: `H:MM:SS`
///
/// Fractional seconds are truncated, matching how players count up.
/// Negative and non-finite inputs render as `0:00`.
///
/// # Examples
///
/// ```
/// use ytmp_common::human_time::format_clock;
///
/// assert_eq!(format_clock(0.0), "0:00");
/// assert_eq!(format_clock(59.9), "0:59");
/// assert_eq!(format_clock(185.0), "3:05");
/// assert_eq!(format_clock(3725.0), "1:02:05");
/// ```
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };

    if total >= HOURS_FORMAT_MIN {
        let hours = total / 3600;
        let mins = (total % 3600) / 60;
        let secs = total % 60;
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", total / 60, total % 60)
    }
}

/// Format the `position / duration` label published with each progress update.
///
/// # Examples
///
/// ```
/// use ytmp_common::human_time::format_progress_label;
///
/// assert_eq!(format_progress_label(65.2, 180.0), "1:05 / 3:00");
/// ```
pub fn format_progress_label(position_seconds: f64, duration_seconds: f64) -> String {
    format!(
        "{} / {}",
        format_clock(position_seconds),
        format_clock(duration_seconds)
    )
}

/// Progress as a percentage of duration, clamped to `[0, 100]`.
///
/// A zero or invalid duration yields 0.
pub fn progress_percent(position_seconds: f64, duration_seconds: f64) -> f64 {
    if !duration_seconds.is_finite() || duration_seconds <= 0.0 || !position_seconds.is_finite() {
        return 0.0;
    }
    (position_seconds / duration_seconds * 100.0).clamp(0.0, 100.0)
}
