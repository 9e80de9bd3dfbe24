//! Week/day calendar layout.
//!
//! A displayed day holds the reservations touching it, clipped to the day.
//! Overlapping events are packed greedily into columns, the visible hour
//! range is derived from the events of all displayed days, and every event
//! gets a top offset and height in pixels measured in 15 minute quarts.

mod day;
mod layout;

pub use day::Day;
pub use layout::{
    annotate, business_hours, clip_to_day, overlaps, quart_bounds, split_columns, DayEvent,
    DayPlanner, Geometry, PlannedDays, DEFAULT_QUARTER_HEIGHT,
};

use chrono::{Datelike, Duration, NaiveDate, Timelike, Weekday};

use crate::error::{Error, Result};

/// Quarter hours since midnight, rounded down: 0 for 0:00-0:15 up to 95
/// for 23:45-0:00.
pub fn quarts<T: Timelike>(time: &T) -> u32 {
    time.hour() * 4 + time.minute() / 15
}

/// Monday through Sunday of ISO week `week` of ISO year `year`.
pub fn week_days(year: i32, week: u32) -> Result<Vec<NaiveDate>> {
    let monday = NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)
        .ok_or_else(|| Error::InvalidDate(format!("{year} week {week}")))?;
    (0..7).map(|i| shift_days(monday, i)).collect()
}

/// `date` moved by `days`, or an error past the representable range.
pub fn shift_days(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
        .ok_or_else(|| Error::InvalidDate(format!("{date} {days:+} days")))
}

/// ISO `(year, week)` of a date.
pub fn iso_week(date: NaiveDate) -> (i32, u32) {
    let iso = date.iso_week();
    (iso.year(), iso.week())
}

/// The weeks of a month grid, Monday first, padded with days of the
/// neighbouring months so every week is complete.
pub fn month_weeks(year: i32, month: u32) -> Result<Vec<Vec<NaiveDate>>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::InvalidDate(format!("{year}-{month}")))?;
    let mut cursor = shift_days(first, -(first.weekday().num_days_from_monday() as i64))?;

    let mut weeks = Vec::new();
    loop {
        let week = (0..7)
            .map(|i| shift_days(cursor, i))
            .collect::<Result<Vec<NaiveDate>>>()?;
        weeks.push(week);
        cursor = shift_days(cursor, 7)?;
        if cursor.month() != month {
            break;
        }
    }
    Ok(weeks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    #[test]
    fn quarts_round_down() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(quarts(&t(0, 0)), 0);
        assert_eq!(quarts(&t(0, 14)), 0);
        assert_eq!(quarts(&t(8, 15)), 33);
        assert_eq!(quarts(&NaiveTime::from_hms_opt(23, 59, 59).unwrap()), 95);
    }

    #[test]
    fn week_days_follow_iso_weeks() {
        let days = week_days(2024, 1).unwrap();
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(days[6], NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());

        // ISO 2021 week 1 starts on Monday 2021-01-04
        let days = week_days(2021, 1).unwrap();
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2021, 1, 4).unwrap());

        assert!(week_days(2021, 54).is_err());
    }

    #[test]
    fn month_grid_is_padded() {
        // February 2021 starts on a Monday and fills exactly four weeks
        let weeks = month_weeks(2021, 2).unwrap();
        assert_eq!(weeks.len(), 4);

        // May 2024 starts on a Wednesday and ends on a Friday
        let weeks = month_weeks(2024, 5).unwrap();
        assert_eq!(weeks.len(), 5);
        assert_eq!(weeks[0][0], NaiveDate::from_ymd_opt(2024, 4, 29).unwrap());
        assert_eq!(weeks[4][6], NaiveDate::from_ymd_opt(2024, 6, 2).unwrap());
        assert!(weeks.iter().all(|w| w.len() == 7));
    }

    #[test]
    fn iso_week_of_new_year() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(iso_week(date), (2020, 53));
    }
}
