// src/query/quarter.rs
//
// Calendar quarters: Q1 = Jan 1 – Mar 31 and so on. No fiscal-year offset.

use chrono::{Datelike, NaiveDate};

/// Inclusive date range for a calendar quarter. `None` when `quarter` is
/// outside 1..=4.
pub fn quarter_range(year: i32, quarter: u32) -> Option<(NaiveDate, NaiveDate)> {
    let (start_month, end_month, end_day) = match quarter {
        1 => (1, 3, 31),
        2 => (4, 6, 30),
        3 => (7, 9, 30),
        4 => (10, 12, 31),
        _ => return None,
    };
    let start = NaiveDate::from_ymd_opt(year, start_month, 1)?;
    let end = NaiveDate::from_ymd_opt(year, end_month, end_day)?;
    Some((start, end))
}

/// Which calendar quarter a date falls in (1..=4).
pub fn quarter_of(date: NaiveDate) -> u32 {
    (date.month() - 1) / 3 + 1
}

/// (year, quarter) containing `today`.
pub fn current_quarter(today: NaiveDate) -> (i32, u32) {
    (today.year(), quarter_of(today))
}
