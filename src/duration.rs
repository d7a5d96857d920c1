//! Parsing of human-authored expiration durations (`IMAGE_EXPIRES_AFTER`).
//!
//! Accepted forms:
//!
//! - `<number>h`, `<number>d`, `<number>w` (hours, days, weeks; the number
//!   may be fractional, e.g. `1.5d`)
//! - anything the `humantime` grammar understands (`30m`, `90s`, `1h 30m`)
//!
//! Parsing never fails. Empty, negative or unparseable input yields a zero
//! duration, which callers treat as "no expiration".

use std::time::Duration;

const SECONDS_PER_HOUR: f64 = 3600.0;

/// Parses an expiration duration, returning `Duration::ZERO` for anything it
/// does not understand.
pub fn parse_duration(input: &str) -> Duration {
    let input = input.trim();
    if input.is_empty() {
        return Duration::ZERO;
    }

    if let Some(duration) = parse_hour_multiple(input) {
        return duration;
    }

    humantime::parse_duration(input).unwrap_or(Duration::ZERO)
}

/// Handles the single-letter `h`/`d`/`w` suffixes, which all reduce to a
/// multiple of hours.
fn parse_hour_multiple(input: &str) -> Option<Duration> {
    let (split, unit) = input.char_indices().last()?;
    let hours_per_unit = match unit {
        'h' => 1.0,
        'd' => 24.0,
        'w' => 24.0 * 7.0,
        _ => return None,
    };

    let value: f64 = input[..split].parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    Duration::try_from_secs_f64(value * hours_per_unit * SECONDS_PER_HOUR).ok()
}
