//! Timestamp parsing and the storage format of timestamp columns.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use crate::errors::ParseTimestampError;

/// Storage format for every timestamp column in the warehouse.
///
/// Fixed-width and most-significant-first, so string comparison in SQL agrees
/// with chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Parses a loosely formatted timestamp such as `2020-03-08 14:05:00`,
/// `2020-03-08T14:05` or `2020/03/08`.
///
/// Digit groups are read in the order year, month, day, hour, minute, second.
/// Missing trailing groups default to the start of the period (January, the
/// first of the month, midnight). Offsets and fractional seconds are ignored
/// and the result is interpreted as UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ParseTimestampError> {
    let digits: Vec<i64> = input
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .take(6)
        .filter_map(|s| s.parse::<i64>().ok())
        .collect();
    if digits.is_empty() {
        return Err(ParseTimestampError::NoDigits(input.to_string()));
    }
    let component = |index: usize, default: i64| -> Result<u32, ParseTimestampError> {
        let value = digits.get(index).copied().unwrap_or(default);
        u32::try_from(value).map_err(|_| {
            ParseTimestampError::ChronoError(format!("component out of range in \"{input}\""))
        })
    };
    let year = i32::try_from(digits[0]).map_err(|_| {
        ParseTimestampError::ChronoError(format!("year out of range in \"{input}\""))
    })?;
    let month = component(1, 1)?;
    let day = component(2, 1)?;
    let hour = component(3, 0)?;
    let minute = component(4, 0)?;
    let second = component(5, 0)?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        ParseTimestampError::ChronoError(format!("invalid date: {year}-{month}-{day}"))
    })?;
    let time = NaiveTime::from_hms_opt(hour, minute, second).ok_or_else(|| {
        ParseTimestampError::ChronoError(format!("invalid time: {hour}:{minute}:{second}"))
    })?;
    let naive = NaiveDateTime::new(date, time);
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// Renders a timestamp in [`TIMESTAMP_FORMAT`].
pub fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_full_and_partial_timestamps() {
        let full = parse_timestamp("2020-03-08 14:05:09").unwrap();
        assert_eq!(full, Utc.with_ymd_and_hms(2020, 3, 8, 14, 5, 9).unwrap());
        let iso = parse_timestamp("2020-03-08T14:05").unwrap();
        assert_eq!(iso, Utc.with_ymd_and_hms(2020, 3, 8, 14, 5, 0).unwrap());
        let date_only = parse_timestamp("1962/07/24").unwrap();
        assert_eq!(date_only, Utc.with_ymd_and_hms(1962, 7, 24, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_inputs_without_digits_or_with_bad_dates() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ParseTimestampError::NoDigits(_))
        ));
        assert!(matches!(
            parse_timestamp("2021-02-30"),
            Err(ParseTimestampError::ChronoError(_))
        ));
    }

    #[test]
    fn formatted_timestamps_parse_back() {
        let ts = Utc.with_ymd_and_hms(2012, 9, 7, 6, 10, 0).unwrap();
        let text = format_timestamp(&ts);
        assert_eq!(text, "2012-09-07 06:10:00");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }
}
