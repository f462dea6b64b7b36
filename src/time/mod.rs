pub mod error;
pub mod timeunit;

use chrono::{DateTime, Local};
use std::time::Duration;

/// Fractional milliseconds, the unit every report uses for timings.
#[inline]
pub fn as_millis_f64(duration: &Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

/// Timestamp suffix shared by every artifact of one run.
pub fn file_stamp(moment: &DateTime<Local>) -> String {
    moment.format("%Y%m%d_%H%M%S").to_string()
}

/// Short human readable rendering used on the console.
pub fn humanize(duration: &Duration) -> String {
    let millis = as_millis_f64(duration);
    if millis < 1.0 {
        format!("{}us", duration.as_micros())
    } else if millis < 1_000.0 {
        format!("{:.1}ms", millis)
    } else if millis < 60_000.0 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}
