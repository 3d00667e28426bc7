use chrono::Duration;

/// Render a millisecond uptime as its leading time units.
///
/// `90061000` → `"1d 1h 1m"`, `65000` → `"1m 5s"`, `900` → `"0s"`.
pub fn format_uptime(milliseconds: u64) -> String {
    let seconds = milliseconds / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("{}d {}h {}m", days, hours % 24, minutes % 60)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes % 60, seconds % 60)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// Parse a dashboard time range like `"30m"`, `"1h"`, `"24h"` or `"7d"`.
///
/// Returns `None` for anything unparseable; callers fall back to their own
/// default range.
pub fn parse_time_range(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.len() < 2 {
        return None;
    }

    let (value, unit) = input.split_at(input.len() - 1);
    let value: i64 = value.parse().ok()?;
    if value < 0 {
        return None;
    }

    match unit {
        "s" => Some(Duration::seconds(value)),
        "m" => Some(Duration::minutes(value)),
        "h" => Some(Duration::hours(value)),
        "d" => Some(Duration::days(value)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn uptime_with_days_renders_days_hours_minutes() {
        assert_eq!(format_uptime(90_061_000), "1d 1h 1m");
    }

    #[test]
    fn uptime_with_minutes_renders_minutes_seconds() {
        assert_eq!(format_uptime(65_000), "1m 5s");
    }

    #[test]
    fn uptime_with_hours_renders_hours_minutes_seconds() {
        assert_eq!(format_uptime(3_725_000), "1h 2m 5s");
    }

    #[test]
    fn uptime_below_a_minute_renders_seconds() {
        assert_eq!(format_uptime(900), "0s");
        assert_eq!(format_uptime(59_000), "59s");
    }

    #[test]
    fn time_ranges_parse() {
        assert_eq!(parse_time_range("30m"), Some(Duration::minutes(30)));
        assert_eq!(parse_time_range("1h"), Some(Duration::hours(1)));
        assert_eq!(parse_time_range("7d"), Some(Duration::days(7)));
        assert_eq!(parse_time_range("45s"), Some(Duration::seconds(45)));
    }

    #[test]
    fn invalid_time_ranges_are_rejected() {
        assert_eq!(parse_time_range(""), None);
        assert_eq!(parse_time_range("h"), None);
        assert_eq!(parse_time_range("12x"), None);
        assert_eq!(parse_time_range("-1h"), None);
    }
}
