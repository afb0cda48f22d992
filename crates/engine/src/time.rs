/// Timeline ticks per second. Every time value inside the engine is an `i64`
/// count of microseconds.
pub const TIMELINE_TIME_BASE: i64 = 1_000_000;

const TICKS_PER_MILLI: i64 = TIMELINE_TIME_BASE / 1_000;

/// Converts seconds to timeline ticks with nearest rounding.
///
/// Non-finite input maps to `0`.
///
/// # Example
/// ```
/// use chapter_engine::time::seconds_to_tl;
///
/// assert_eq!(seconds_to_tl(1.5), 1_500_000);
/// assert_eq!(seconds_to_tl(f64::NAN), 0);
/// ```
pub fn seconds_to_tl(seconds: f64) -> i64 {
    if !seconds.is_finite() {
        return 0;
    }
    let ticks = (seconds * TIMELINE_TIME_BASE as f64).round();
    ticks.clamp(i64::MIN as f64, i64::MAX as f64) as i64
}

/// Converts timeline ticks to seconds.
pub fn tl_to_seconds(t_tl: i64) -> f64 {
    t_tl as f64 / TIMELINE_TIME_BASE as f64
}

/// Converts a millisecond setting to timeline ticks.
pub fn millis_to_tl(millis: u64) -> i64 {
    i64::try_from(millis)
        .unwrap_or(i64::MAX)
        .saturating_mul(TICKS_PER_MILLI)
}

/// Parses an `HH:MM:SS.mmm` chapter timestamp into timeline ticks.
///
/// The value is `h*3600 + m*60 + s + ms/1000`. Malformed strings parse to `0`.
///
/// # Example
/// ```
/// use chapter_engine::time::parse_timestamp;
///
/// assert_eq!(parse_timestamp("01:02:03.045"), 3_723_045_000);
/// assert_eq!(parse_timestamp("garbage"), 0);
/// ```
pub fn parse_timestamp(value: &str) -> i64 {
    parse_timestamp_parts(value.trim()).unwrap_or(0)
}

fn parse_timestamp_parts(value: &str) -> Option<i64> {
    let mut parts = value.split(':');
    let hours = parse_digits(parts.next()?)?;
    let minutes = parse_digits(parts.next()?)?;
    let seconds_part = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let (seconds, millis) = match seconds_part.split_once('.') {
        Some((seconds, fraction)) => (parse_digits(seconds)?, parse_fraction_millis(fraction)?),
        None => (parse_digits(seconds_part)?, 0),
    };

    let total_millis = hours
        .checked_mul(3_600_000)?
        .checked_add(minutes.checked_mul(60_000)?)?
        .checked_add(seconds.checked_mul(1_000)?)?
        .checked_add(millis)?;
    total_millis.checked_mul(TICKS_PER_MILLI)
}

fn parse_digits(value: &str) -> Option<i64> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

// Fractions are read as decimal digits: ".5" is 500ms, ".0451" truncates to 45ms.
fn parse_fraction_millis(fraction: &str) -> Option<i64> {
    if fraction.is_empty() || !fraction.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let mut millis = 0;
    for (index, byte) in fraction.bytes().chain(std::iter::repeat(b'0')).take(3).enumerate() {
        let digit = i64::from(byte - b'0');
        millis += digit * 10_i64.pow(2 - index as u32);
    }
    Some(millis)
}

/// Formats timeline ticks as `HH:MM:SS.mmm`, rounding to the nearest millisecond.
///
/// Negative input is formatted as zero.
///
/// # Example
/// ```
/// use chapter_engine::time::format_timestamp;
///
/// assert_eq!(format_timestamp(3_723_045_000), "01:02:03.045");
/// assert_eq!(format_timestamp(999_600), "00:00:01.000");
/// ```
pub fn format_timestamp(t_tl: i64) -> String {
    let total_millis = (t_tl.max(0) + TICKS_PER_MILLI / 2) / TICKS_PER_MILLI;
    let millis = total_millis % 1_000;
    let total_seconds = total_millis / 1_000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3_600;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}
