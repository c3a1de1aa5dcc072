//! US federal holiday calendar.
//!
//! Fixed-date and nth-weekday rules computed directly with chrono.
//! Observed-day shifting (holiday lands on a weekend) is not applied:
//! weekend days are handled by the weekend check upstream.

use chrono::{Datelike, NaiveDate, Weekday};

/// Whether `date` is a US federal holiday.
pub fn is_us_holiday(date: NaiveDate) -> bool {
    let year = date.year();

    // Fixed-date holidays
    if matches!(
        (date.month(), date.day()),
        (1, 1)    // New Year's Day
        | (6, 19) // Juneteenth
        | (7, 4)  // Independence Day
        | (11, 11) // Veterans Day
        | (12, 25) // Christmas Day
    ) {
        return true;
    }

    // Nth-weekday holidays
    let floating = [
        nth_weekday(year, 1, Weekday::Mon, 3),  // MLK Day
        nth_weekday(year, 2, Weekday::Mon, 3),  // Presidents Day
        last_weekday(year, 5, Weekday::Mon),    // Memorial Day
        nth_weekday(year, 9, Weekday::Mon, 1),  // Labor Day
        nth_weekday(year, 10, Weekday::Mon, 2), // Columbus Day
        nth_weekday(year, 11, Weekday::Thu, 4), // Thanksgiving
    ];

    floating.iter().any(|d| *d == Some(date))
}

/// The nth occurrence of `weekday` in the given month (1-based).
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (7 + weekday.num_days_from_monday() - first.weekday().num_days_from_monday()) % 7;
    let day = 1 + offset + (n - 1) * 7;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// The last occurrence of `weekday` in the given month.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> Option<NaiveDate> {
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let last = next_month.pred_opt()?;
    let offset = (7 + last.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    last.checked_sub_days(chrono::Days::new(offset as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_fixed_dates() {
        assert!(is_us_holiday(d(2026, 1, 1)));
        assert!(is_us_holiday(d(2026, 7, 4)));
        assert!(is_us_holiday(d(2026, 12, 25)));
        assert!(is_us_holiday(d(2026, 6, 19)));
        assert!(!is_us_holiday(d(2026, 3, 10)));
    }

    #[test]
    fn test_floating_holidays_2026() {
        // MLK Day 2026: Monday January 19
        assert!(is_us_holiday(d(2026, 1, 19)));
        // Memorial Day 2026: Monday May 25
        assert!(is_us_holiday(d(2026, 5, 25)));
        // Labor Day 2026: Monday September 7
        assert!(is_us_holiday(d(2026, 9, 7)));
        // Thanksgiving 2026: Thursday November 26
        assert!(is_us_holiday(d(2026, 11, 26)));
        // The Mondays around them are not holidays
        assert!(!is_us_holiday(d(2026, 1, 12)));
        assert!(!is_us_holiday(d(2026, 9, 14)));
    }

    #[test]
    fn test_nth_weekday_math() {
        // First Monday of September 2026 is the 7th
        assert_eq!(nth_weekday(2026, 9, Weekday::Mon, 1), Some(d(2026, 9, 7)));
        // Last Monday of May 2026 is the 25th
        assert_eq!(last_weekday(2026, 5, Weekday::Mon), Some(d(2026, 5, 25)));
    }
}
