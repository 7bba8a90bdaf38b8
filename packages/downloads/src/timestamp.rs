//! The fixed `M/D/YYYY, hh:mm:ss AM|PM` timestamp format of the download
//! log.

use building_watch_score_models::DateParseError;
use chrono::{NaiveDate, NaiveDateTime};

/// Parsing pattern. Month, day and hour may be unpadded.
const PARSE_FORMAT: &str = "%m/%d/%Y, %I:%M:%S %p";

/// Pattern written by [`format_timestamp`].
const WRITE_FORMAT: &str = "%-m/%-d/%Y, %-I:%M:%S %p";

/// Human-readable form of the pattern, for error messages.
pub const TIMESTAMP_PATTERN: &str = "M/D/YYYY, hh:mm:ss AM|PM";

/// Shown in place of the date of an unparsable timestamp.
pub const INVALID_DATE: &str = "Invalid date";

/// Shown in place of the time of an unparsable timestamp.
pub const INVALID_TIME: &str = "Invalid time";

/// Parses a download timestamp such as `1/2/2024, 3:04:05 PM`.
///
/// Locale formatters sometimes emit a narrow or regular no-break space
/// before the meridiem; both are accepted.
///
/// # Errors
///
/// Returns [`DateParseError`] if the text does not match the pattern.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, DateParseError> {
    let normalized: String = s
        .trim()
        .chars()
        .map(|c| match c {
            '\u{202f}' | '\u{a0}' => ' ',
            other => other,
        })
        .collect();

    NaiveDateTime::parse_from_str(&normalized, PARSE_FORMAT).map_err(|_| DateParseError {
        input: s.to_string(),
        pattern: TIMESTAMP_PATTERN,
    })
}

/// Formats a local time the way the download log stores it.
#[must_use]
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(WRITE_FORMAT).to_string()
}

/// Parses a filter date such as `1/2/2024` or `2024-01-02`.
///
/// # Errors
///
/// Returns [`DateParseError`] if the text matches neither form.
pub fn parse_filter_date(s: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = s.trim();
    NaiveDate::parse_from_str(trimmed, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .map_err(|_| DateParseError {
            input: s.to_string(),
            pattern: "M/D/YYYY or YYYY-MM-DD",
        })
}

/// Splits a timestamp into `MM/DD/YYYY` and 24-hour `HH:MM:SS` display
/// strings, or the invalid markers if it does not parse.
#[must_use]
pub fn display_parts(parsed: Option<NaiveDateTime>) -> (String, String) {
    parsed.map_or_else(
        || (INVALID_DATE.to_string(), INVALID_TIME.to_string()),
        |at| {
            (
                at.format("%m/%d/%Y").to_string(),
                at.format("%H:%M:%S").to_string(),
            )
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn parses_unpadded_afternoon() {
        assert_eq!(
            parse_timestamp("1/2/2024, 3:04:05 PM").unwrap(),
            at(2024, 1, 2, 15, 4, 5)
        );
    }

    #[test]
    fn parses_padded_morning_and_midnight() {
        assert_eq!(
            parse_timestamp("11/30/2023, 09:15:00 AM").unwrap(),
            at(2023, 11, 30, 9, 15, 0)
        );
        assert_eq!(
            parse_timestamp("11/30/2023, 12:00:01 AM").unwrap(),
            at(2023, 11, 30, 0, 0, 1)
        );
    }

    #[test]
    fn accepts_narrow_no_break_space() {
        assert_eq!(
            parse_timestamp("7/4/2024, 8:00:00\u{202f}PM").unwrap(),
            at(2024, 7, 4, 20, 0, 0)
        );
    }

    #[test]
    fn rejects_other_formats() {
        for bad in ["2024-01-02T03:04:05", "1/2/2024 3:04:05 PM", "", "13/2/2024, 1:00:00 PM"] {
            let err = parse_timestamp(bad).unwrap_err();
            assert_eq!(err.input, bad);
            assert_eq!(err.pattern, TIMESTAMP_PATTERN);
        }
    }

    #[test]
    fn formatted_timestamps_parse_back() {
        let original = at(2024, 2, 9, 13, 7, 42);
        let text = format_timestamp(original);
        assert_eq!(text, "2/9/2024, 1:07:42 PM");
        assert_eq!(parse_timestamp(&text).unwrap(), original);
    }

    #[test]
    fn display_parts_use_24_hour_clock() {
        let (date, time) = display_parts(Some(at(2024, 2, 9, 13, 7, 42)));
        assert_eq!(date, "02/09/2024");
        assert_eq!(time, "13:07:42");

        let (date, time) = display_parts(None);
        assert_eq!(date, INVALID_DATE);
        assert_eq!(time, INVALID_TIME);
    }
}
