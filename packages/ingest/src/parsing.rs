//! Cell-level parsing shared by every counter and catalog reader.

use chrono::NaiveDate;

/// Day-month-year format used by the source feeds.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Normalizes a CSV header cell: surrounding whitespace removed, lower
/// case.
#[must_use]
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Parses a day-month-year date. Returns `None` for anything else; callers
/// treat that as an unknown date rather than substituting today.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT).ok()
}

/// Parses a non-negative counter cell.
///
/// Empty cells count as zero. Integral floats (`"12.0"`, as written by
/// spreadsheet exports) are accepted; negative, fractional, or non-numeric
/// values are rejected.
#[must_use]
pub fn parse_count(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return Some(0);
    }
    if let Ok(value) = text.parse::<u64>() {
        return Some(value);
    }

    let value = text.parse::<f64>().ok()?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > 9.0e15 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_headers() {
        assert_eq!(normalize_header("  Age_0_5 "), "age_0_5");
        assert_eq!(normalize_header("StateName"), "statename");
    }

    #[test]
    fn parses_day_month_year() {
        let date = parse_date("09-03-2025").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 9).unwrap());
        assert_eq!(parse_date(" 1-3-2025 "), NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn rejects_other_date_shapes() {
        assert!(parse_date("2025-03-09").is_none());
        assert!(parse_date("31-02-2025").is_none());
        assert!(parse_date("").is_none());
        assert!(parse_date("unknown").is_none());
    }

    #[test]
    fn parses_counts() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count(" 7 "), Some(7));
        assert_eq!(parse_count(""), Some(0));
        assert_eq!(parse_count("12.0"), Some(12));
    }

    #[test]
    fn rejects_bad_counts() {
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count("1.5"), None);
        assert_eq!(parse_count("NaN"), None);
        assert_eq!(parse_count("many"), None);
    }
}
