//! Duration parsing for healthcheck timings.
//!
//! Accepts the compose duration grammar: one or more `<number><unit>` pairs
//! such as "5s", "500ms", "1m30s" or "2h".

use std::time::Duration;

/// Parse a duration string like "10s", "1m30s", "500ms", "1h".
///
/// Supported units: `ms`, `s`, `m`, `h`. A bare number is taken as seconds.
/// Returns `None` if the string cannot be parsed.
///
/// # Examples
///
/// ```
/// use labctl::compose::parse_duration_string;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
/// assert_eq!(parse_duration_string("1m30s"), Some(Duration::from_secs(90)));
/// assert_eq!(parse_duration_string("500ms"), Some(Duration::from_millis(500)));
/// assert_eq!(parse_duration_string("30"), Some(Duration::from_secs(30)));
/// ```
pub fn parse_duration_string(s: &str) -> Option<Duration> {
    let s = s.trim();

    if s.is_empty() {
        return None;
    }

    // Default to seconds if no suffix
    if s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse::<u64>().ok().map(Duration::from_secs);
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        let amount: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount.checked_mul(60)?),
            "h" => Duration::from_secs(amount.checked_mul(3600)?),
            _ => return None,
        };
        total = total.checked_add(part)?;
        rest = &rest[unit_len..];
    }

    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_seconds() {
        assert_eq!(parse_duration_string("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration_string("120s"), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_parse_duration_minutes_and_hours() {
        assert_eq!(parse_duration_string("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration_string("2h"), Some(Duration::from_secs(7200)));
    }

    #[test]
    fn test_parse_duration_milliseconds() {
        assert_eq!(parse_duration_string("500ms"), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_parse_duration_compound() {
        assert_eq!(parse_duration_string("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(
            parse_duration_string("1h1m1s500ms"),
            Some(Duration::from_millis(3_661_500))
        );
    }

    #[test]
    fn test_parse_duration_no_suffix() {
        assert_eq!(parse_duration_string("10"), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_parse_duration_with_whitespace() {
        assert_eq!(parse_duration_string("  5s  "), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_parse_duration_invalid() {
        assert_eq!(parse_duration_string(""), None);
        assert_eq!(parse_duration_string("abc"), None);
        assert_eq!(parse_duration_string("5x"), None);
        assert_eq!(parse_duration_string("-5s"), None);
        assert_eq!(parse_duration_string("s5"), None);
        assert_eq!(parse_duration_string("5 s"), None);
    }
}
