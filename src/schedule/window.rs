//! Active windows and enabled date ranges.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use std::fmt;
use std::str::FromStr;

use crate::astro::DayBoundary;

/// Whether a window is currently open, given its next start and next end.
///
/// Both instants are resolved from the same `now`. If the end comes first,
/// the start that opened the current window has already passed: we are inside.
pub fn is_inside_window(next_start: DateTime<Utc>, next_end: DateTime<Utc>) -> bool {
    next_end < next_start
}

/// A calendar day without a year (`MM-DD`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    pub fn new(month: u32, day: u32) -> Option<Self> {
        // 2024 is a leap year, so Feb 29 is accepted
        NaiveDate::from_ymd_opt(2024, month, day).map(|_| Self { month, day })
    }

    /// This day in `year`. Feb 29 falls back to Feb 28 in common years.
    pub fn in_year(&self, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .or_else(|| NaiveDate::from_ymd_opt(year, self.month, self.day - 1))
            .unwrap_or(NaiveDate::MIN)
    }
}

impl FromStr for MonthDay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid date '{s}' (expected MM-DD)");
        let (month, day) = s.trim().split_once('-').ok_or_else(invalid)?;
        let month = month.parse::<u32>().map_err(|_| invalid())?;
        let day = day.parse::<u32>().map_err(|_| invalid())?;
        Self::new(month, day).ok_or_else(invalid)
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Outcome of checking a date range against now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeCheck {
    Inside,
    /// Now is outside; the range opens again on this date.
    Outside { next_start: NaiveDate },
}

/// Days of the year on which a node is enabled, inclusive on both ends.
///
/// `start > end` spans the year boundary (e.g. 11-02 to 03-20).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: MonthDay,
    pub end: MonthDay,
}

impl DateRange {
    pub fn new(start: MonthDay, end: MonthDay) -> Self {
        Self { start, end }
    }

    pub fn wraps_year(&self) -> bool {
        self.start > self.end
    }

    /// Check the calendar day of `now` under `boundary`.
    pub fn check(&self, now: DateTime<Utc>, boundary: &DayBoundary) -> RangeCheck {
        self.check_date(boundary.date_of(now))
    }

    pub fn check_date(&self, today: NaiveDate) -> RangeCheck {
        let year = today.year();
        let start = self.start.in_year(year);
        let end = self.end.in_year(year);

        if self.wraps_year() {
            if today > end && today < start {
                return RangeCheck::Outside { next_start: start };
            }
            return RangeCheck::Inside;
        }

        if today < start {
            RangeCheck::Outside { next_start: start }
        } else if today > end {
            RangeCheck::Outside {
                next_start: self.start.in_year(year + 1),
            }
        } else {
            RangeCheck::Inside
        }
    }

    /// Instant the range next opens, at the start of its first day.
    pub fn opening(&self, next_start: NaiveDate, boundary: &DayBoundary) -> DateTime<Utc> {
        boundary.at(next_start, NaiveTime::MIN)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}
