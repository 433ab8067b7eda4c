use chrono::{DateTime, Utc};

/// Display format for timestamps in the results table, e.g. `Mar 05, 2024 03:07 PM`.
pub const DISPLAY_DATETIME: &str = "%b %d, %Y %I:%M %p";

pub fn display_datetime(t: &DateTime<Utc>) -> String {
    t.format(DISPLAY_DATETIME).to_string()
}

/// Raw Unix seconds, used by the table widget as the sort value of a date column.
pub fn sort_timestamp(t: &DateTime<Utc>) -> i64 {
    t.timestamp()
}

/// Rounds to four decimals and trims trailing zeros: `12.50000` -> `12.5`, `12.0` -> `12`.
pub fn trimmed_decimal(value: f64) -> String {
    if !value.is_finite() {
        return String::new();
    }
    let mut s = format!("{value:.4}");
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.').len();
        s.truncate(trimmed);
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

pub fn optional_decimal(value: Option<f64>) -> String {
    value.map(trimmed_decimal).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn trims_trailing_zeros() {
        assert_eq!(trimmed_decimal(12.50000), "12.5");
        assert_eq!(trimmed_decimal(12.0), "12");
        assert_eq!(trimmed_decimal(-110.0), "-110");
        assert_eq!(trimmed_decimal(0.0), "0");
    }

    #[test]
    fn rounds_to_four_places() {
        assert_eq!(trimmed_decimal(33.123456), "33.1235");
        assert_eq!(trimmed_decimal(6.00001), "6");
        assert_eq!(trimmed_decimal(-0.00001), "0");
    }

    #[test]
    fn absent_values_render_empty() {
        assert_eq!(optional_decimal(None), "");
        assert_eq!(optional_decimal(Some(f64::NAN)), "");
    }

    #[test]
    fn datetime_uses_twelve_hour_clock() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 15, 7, 42).unwrap();
        assert_eq!(display_datetime(&t), "Mar 05, 2024 03:07 PM");
        assert_eq!(sort_timestamp(&t), 1_709_651_262);
    }
}
