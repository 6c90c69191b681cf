//! Logical calendar used for obligation accounting.
//!
//! Day 31 of a month is collapsed into day 30, so a month's logical length is
//! `min(real length, 30)`. February keeps its real 28 or 29 days. Adding days
//! rolls over at the last logical day of a month into day 1 of the next one
//! and never lands on a 31st.

use chrono::{Datelike, NaiveDate};

/// longest logical month
pub const LOGICAL_MONTH_DAYS: u32 = 30;

/// check if year is a leap year
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

fn real_month_length(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

/// number of logical days in a month
pub fn logical_month_length(year: i32, month: u32) -> u32 {
    real_month_length(year, month).min(LOGICAL_MONTH_DAYS)
}

/// day of month with the 31st collapsed into the 30th
pub fn logical_day(date: NaiveDate) -> u32 {
    date.day().min(LOGICAL_MONTH_DAYS)
}

/// leap years in [1, year], extended to negative years by floor division
fn leap_years_through(year: i64) -> i64 {
    year.div_euclid(4) - year.div_euclid(100) + year.div_euclid(400)
}

/// position of a date on the logical day line.
///
/// only differences between ordinals are meaningful.
fn logical_ordinal(date: NaiveDate) -> i64 {
    let year = date.year();
    let month = date.month();

    // eleven 30-day months plus february
    let before_year = 358 * year as i64 + leap_years_through(year as i64 - 1);

    let mut before_month = 30 * (month as i64 - 1);
    if month > 2 {
        before_month -= (LOGICAL_MONTH_DAYS - logical_month_length(year, 2)) as i64;
    }

    before_year + before_month + logical_day(date) as i64 - 1
}

/// signed logical days from `start` to `end`, negative when `end < start`
pub fn logical_days_between(start: NaiveDate, end: NaiveDate) -> i64 {
    logical_ordinal(end) - logical_ordinal(start)
}

/// advance `date` by `days` logical days.
///
/// a zero-day add returns `date` unchanged, even on a 31st.
pub fn add_logical_days(date: NaiveDate, days: u32) -> NaiveDate {
    if days == 0 {
        return date;
    }

    let mut year = date.year();
    let mut month = date.month();
    let mut day = logical_day(date);
    let mut remaining = days;

    loop {
        let room = logical_month_length(year, month) - day;
        if remaining <= room {
            return NaiveDate::from_ymd_opt(year, month, day + remaining)
                .unwrap_or(NaiveDate::MAX);
        }

        remaining -= room + 1;
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
        day = 1;
    }
}

/// next logical day
pub fn next_logical_day(date: NaiveDate) -> NaiveDate {
    add_logical_days(date, 1)
}

/// the logical day before `date`; the day before a 31st is the 29th
pub fn previous_logical_day(date: NaiveDate) -> NaiveDate {
    let day = logical_day(date);
    if day > 1 {
        return NaiveDate::from_ymd_opt(date.year(), date.month(), day - 1).unwrap_or(date);
    }

    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, logical_month_length(year, month)).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_zero_day_add_is_identity() {
        assert_eq!(add_logical_days(d(2024, 1, 15), 0), d(2024, 1, 15));
        assert_eq!(add_logical_days(d(2024, 1, 31), 0), d(2024, 1, 31));
    }

    #[test]
    fn test_month_rollover() {
        assert_eq!(add_logical_days(d(2024, 1, 29), 1), d(2024, 1, 30));
        assert_eq!(add_logical_days(d(2024, 1, 30), 1), d(2024, 2, 1));
        assert_eq!(add_logical_days(d(2024, 1, 31), 1), d(2024, 2, 1));
        assert_eq!(add_logical_days(d(2024, 2, 28), 1), d(2024, 2, 29));
        assert_eq!(add_logical_days(d(2023, 2, 28), 1), d(2023, 3, 1));
        assert_eq!(add_logical_days(d(2023, 12, 30), 1), d(2024, 1, 1));
    }

    #[test]
    fn test_adds_across_several_months() {
        // 30 (jan) + 29 (feb) + 1
        assert_eq!(add_logical_days(d(2024, 1, 1), 60), d(2024, 3, 2));
        // 358 logical days in 2023
        assert_eq!(add_logical_days(d(2023, 1, 1), 358), d(2024, 1, 1));
        assert_eq!(add_logical_days(d(2024, 1, 1), 359), d(2025, 1, 1));
    }

    #[test]
    fn test_down_payment_offset() {
        assert_eq!(add_logical_days(d(2024, 1, 1), 2), d(2024, 1, 3));
    }

    #[test]
    fn test_between_normalizes_day_31() {
        assert_eq!(logical_days_between(d(2024, 1, 31), d(2024, 3, 1)), 30);
        assert_eq!(logical_days_between(d(2024, 1, 30), d(2024, 1, 31)), 0);
        assert_eq!(logical_days_between(d(2024, 1, 1), d(2024, 2, 1)), 30);
        assert_eq!(logical_days_between(d(2024, 3, 1), d(2024, 4, 1)), 30);
    }

    #[test]
    fn test_between_is_signed() {
        assert_eq!(logical_days_between(d(2024, 1, 10), d(2024, 1, 5)), -5);
        assert_eq!(logical_days_between(d(2024, 3, 1), d(2024, 1, 31)), -30);
    }

    #[test]
    fn test_add_and_between_are_inverse() {
        let mut start = d(2023, 1, 1);
        let end = d(2025, 1, 1);

        while start < end {
            for n in (0..70).chain([180, 365, 400, 1000]) {
                let target = add_logical_days(start, n);
                assert_eq!(
                    logical_days_between(start, target),
                    n as i64,
                    "start {} + {} landed on {}",
                    start,
                    n,
                    target
                );
                if n > 0 {
                    assert_ne!(target.day(), 31);
                }
            }
            start = start.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_previous_logical_day() {
        assert_eq!(previous_logical_day(d(2024, 3, 1)), d(2024, 2, 29));
        assert_eq!(previous_logical_day(d(2023, 3, 1)), d(2023, 2, 28));
        assert_eq!(previous_logical_day(d(2024, 2, 1)), d(2024, 1, 30));
        assert_eq!(previous_logical_day(d(2024, 1, 1)), d(2023, 12, 30));
        assert_eq!(previous_logical_day(d(2024, 1, 31)), d(2024, 1, 29));
        assert_eq!(previous_logical_day(d(2024, 1, 15)), d(2024, 1, 14));
    }

    #[test]
    fn test_leap_year() {
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
        assert!(is_leap_year(2000));
        assert!(!is_leap_year(1900));
    }
}
