use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};
use tracing::warn;

use crate::model::error::{LeagueError, LeagueResult};

/// Accepted timestamp layouts, tried in order.
const TIMESTAMP_FORMATS: [&str; 4] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"];
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses an ISO-like timestamp. A bare date means midnight.
pub fn parse_timestamp(input: &str) -> LeagueResult<NaiveDateTime> {
    let input = input.trim();

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| parse_date(input).ok().map(day_start_of))
        .ok_or_else(|| LeagueError::validation(format!("Invalid datetime '{}', expected YYYY-MM-DDTHH:MM", input)))
}

pub fn parse_date(input: &str) -> LeagueResult<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
        .map_err(|_| LeagueError::validation(format!("Invalid date '{}', expected YYYY-MM-DD", input.trim())))
}

/// Timestamp for an edit. An unparsable value keeps the existing timestamp,
/// so a typo never silently moves a match to "now".
pub fn timestamp_or_existing(input: &str, existing: NaiveDateTime) -> NaiveDateTime {
    match parse_timestamp(input) {
        Ok(timestamp) => timestamp,
        Err(e) => {
            warn!("{}. Keeping existing time {}", e, format_timestamp(existing));
            existing
        }
    }
}

/// Local time truncated to the minute.
pub fn now_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(now)
}

pub fn day_start(timestamp: NaiveDateTime) -> NaiveDateTime {
    day_start_of(timestamp.date())
}

fn day_start_of(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).unwrap_or(NaiveDateTime::MIN)
}

pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(STORAGE_FORMAT).to_string()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::timestamp;

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = timestamp(27, 14, 30);

        assert_eq!(parse_timestamp("2024-01-27T14:30").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-27T14:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp(" 2024-01-27 14:30 ").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-27").unwrap(), timestamp(27, 0, 0));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(matches!(parse_timestamp("yesterday"), Err(LeagueError::Validation(_))));
        assert!(matches!(parse_timestamp("2024-13-01T10:00"), Err(LeagueError::Validation(_))));
    }

    #[test]
    fn test_edit_timestamp_falls_back_to_existing() {
        let existing = timestamp(3, 9, 15);

        assert_eq!(timestamp_or_existing("not a time", existing), existing);
        assert_eq!(timestamp_or_existing("2024-01-04T10:00", existing), timestamp(4, 10, 0));
    }

    #[test]
    fn test_now_minute_is_truncated() {
        let now = now_minute();
        assert_eq!(now.second(), 0);
        assert_eq!(now.nanosecond(), 0);
    }

    #[test]
    fn test_day_start() {
        assert_eq!(day_start(timestamp(5, 23, 59)), timestamp(5, 0, 0));
        assert_eq!(day_start(NaiveDateTime::MIN).date(), NaiveDateTime::MIN.date());
    }

    #[test]
    fn test_format_round_trip() {
        let ts = timestamp(12, 8, 5);
        assert_eq!(parse_timestamp(&format_timestamp(ts)).unwrap(), ts);
        assert_eq!(format_date(ts.date()), "2024-01-12");
    }
}
