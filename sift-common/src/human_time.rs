//! Human-readable wait-time formatting
//!
//! Used for the user-facing rate-limit message: when the provider asks for a
//! wait longer than the retry ceiling, the scan fails with an estimate a
//! person can act on rather than a raw seconds count.

/// Format a wait duration in seconds as a rounded-up human estimate.
///
/// # Examples
///
/// ```
/// use sift_common::human_time::format_wait_estimate;
///
/// assert_eq!(format_wait_estimate(20), "about 20 seconds");
/// assert_eq!(format_wait_estimate(90), "about 2 minutes");
/// assert_eq!(format_wait_estimate(3600), "about 1 hour");
/// assert_eq!(format_wait_estimate(7300), "about 3 hours");
/// ```
pub fn format_wait_estimate(seconds: u64) -> String {
    if seconds < 60 {
        return format!("about {} seconds", seconds);
    }

    let minutes = seconds.div_ceil(60);
    if minutes < 60 {
        return format!("about {} {}", minutes, plural(minutes, "minute"));
    }

    let hours = minutes.div_ceil(60);
    format!("about {} {}", hours, plural(hours, "hour"))
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        unit.to_string()
    } else {
        format!("{unit}s")
    }
}
