//! Calendar-day ranges for historical queries.

use crate::error::{Error, Result};
use crate::models::Day;

/// Earliest day the reporting source has data for.
pub const MIN_DAY: Day = match Day::from_ymd_opt(2020, 1, 22) {
    Some(d) => d,
    None => panic!("invalid MIN_DAY"),
};

/// Parse a canonical `YYYY-MM-DD` day.
pub fn parse_day(s: &str) -> Result<Day> {
    Day::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|source| Error::InvalidDay {
        input: s.to_string(),
        source,
    })
}

/// Every day from `start` (clamped up to `min_day`) through `end`, inclusive and ascending.
///
/// Returns an empty vector when `end` falls before the clamped start. No upper bound is
/// applied: days after "today" are expanded like any other.
pub fn expand(start: Day, end: Day, min_day: Day) -> Vec<Day> {
    let start = start.max(min_day);
    if end < start {
        return Vec::new();
    }
    start.iter_days().take_while(|d| *d <= end).collect()
}
