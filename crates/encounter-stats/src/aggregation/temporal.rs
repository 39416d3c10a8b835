//! Calendar features derived from timestamps.

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

/// English weekday names, Monday first.
pub const WEEKDAYS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;

/// Hour of day, 0-23.
pub fn hour_of(ts: &NaiveDateTime) -> u32 {
    ts.hour()
}

/// English name of the timestamp's weekday.
pub fn weekday_name(ts: &NaiveDateTime) -> &'static str {
    let index = match ts.weekday() {
        Weekday::Mon => 0,
        Weekday::Tue => 1,
        Weekday::Wed => 2,
        Weekday::Thu => 3,
        Weekday::Fri => 4,
        Weekday::Sat => 5,
        Weekday::Sun => 6,
    };
    WEEKDAYS[index]
}

/// Signed difference `end - start` in fractional days.
pub fn days_between(start: &NaiveDateTime, end: &NaiveDateTime) -> f64 {
    let delta = end.signed_duration_since(*start);
    delta.num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_hour_and_weekday() {
        // 2024-01-01 was a Monday
        let ts = at(2024, 1, 1, 13, 45);
        assert_eq!(hour_of(&ts), 13);
        assert_eq!(weekday_name(&ts), "Monday");
        assert_eq!(weekday_name(&at(2024, 1, 7, 0, 0)), "Sunday");
    }

    #[test]
    fn test_days_between_is_fractional_and_signed() {
        let start = at(2024, 1, 1, 0, 0);
        assert_eq!(days_between(&start, &at(2024, 1, 3, 12, 0)), 2.5);
        assert_eq!(days_between(&at(2024, 1, 3, 12, 0), &start), -2.5);
        assert_eq!(days_between(&start, &start), 0.0);
    }
}
