//! Immutable descriptions of when a node fires.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use std::fmt;
use std::str::FromStr;

use crate::astro::SunEvent;

/// Unit of an offset or interval, expressed as a millisecond multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    pub fn multiplier(&self) -> u64 {
        match self {
            Self::Milliseconds => 1,
            Self::Seconds => 1_000,
            Self::Minutes => 60_000,
            Self::Hours => 3_600_000,
            Self::Days => 86_400_000,
        }
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ms" | "millisecond" | "milliseconds" => Ok(Self::Milliseconds),
            "s" | "sec" | "second" | "seconds" => Ok(Self::Seconds),
            "m" | "min" | "minute" | "minutes" => Ok(Self::Minutes),
            "h" | "hour" | "hours" => Ok(Self::Hours),
            "d" | "day" | "days" => Ok(Self::Days),
            _ => Err(format!("unknown time unit '{s}'")),
        }
    }
}

/// Fixed repeat period: `value * multiplier` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalSpec {
    pub value: f64,
    pub multiplier: u64,
}

impl IntervalSpec {
    pub fn new(value: f64, unit: TimeUnit) -> Self {
        Self {
            value,
            multiplier: unit.multiplier(),
        }
    }

    pub fn period_ms(&self) -> u64 {
        let ms = (self.value * self.multiplier as f64).round();
        if ms.is_finite() && ms > 0.0 { ms as u64 } else { 0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoonEvent {
    Rise,
    Set,
}

/// What a time reference points at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeKind {
    Sun(SunEvent),
    Moon(MoonEvent),
    /// Wall-clock time on each accepted day.
    TimeOfDay(NaiveTime),
    /// One absolute instant.
    Absolute(DateTime<Utc>),
}

impl fmt::Display for TimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sun(event) => write!(f, "sun {event}"),
            Self::Moon(MoonEvent::Rise) => write!(f, "moonrise"),
            Self::Moon(MoonEvent::Set) => write!(f, "moonset"),
            Self::TimeOfDay(time) => write!(f, "{}", time.format("%H:%M:%S")),
            Self::Absolute(instant) => write!(f, "{}", instant.format("%Y-%m-%d %H:%M:%S UTC")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DayParity {
    #[default]
    Any,
    Odd,
    Even,
}

/// Restricts which calendar days a time reference may land on.
///
/// Empty weekday or month lists mean "no restriction".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DayFilter {
    pub parity: DayParity,
    pub weekdays: Vec<Weekday>,
    /// Months as 1-12.
    pub months: Vec<u32>,
}

impl DayFilter {
    pub fn accepts(&self, date: NaiveDate) -> bool {
        let parity_ok = match self.parity {
            DayParity::Any => true,
            DayParity::Odd => date.day() % 2 == 1,
            DayParity::Even => date.day() % 2 == 0,
        };
        parity_ok
            && (self.weekdays.is_empty() || self.weekdays.contains(&date.weekday()))
            && (self.months.is_empty() || self.months.contains(&date.month()))
    }

    pub fn is_unrestricted(&self) -> bool {
        self.parity == DayParity::Any && self.weekdays.is_empty() && self.months.is_empty()
    }
}

/// Reference to a point in time plus an offset of `offset * multiplier` ms.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSpec {
    pub kind: TimeKind,
    pub offset: f64,
    pub multiplier: u64,
    pub filter: DayFilter,
}

impl TimeSpec {
    pub fn new(kind: TimeKind) -> Self {
        Self {
            kind,
            offset: 0.0,
            multiplier: TimeUnit::Minutes.multiplier(),
            filter: DayFilter::default(),
        }
    }

    pub fn with_offset(mut self, offset: f64, unit: TimeUnit) -> Self {
        self.offset = offset;
        self.multiplier = unit.multiplier();
        self
    }

    pub fn with_filter(mut self, filter: DayFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn offset_ms(&self) -> i64 {
        (self.offset * self.multiplier as f64).round() as i64
    }

    /// The instant an absolute reference points at, offset included.
    pub fn absolute_value(&self) -> Option<DateTime<Utc>> {
        match self.kind {
            TimeKind::Absolute(instant) => {
                Some(instant + chrono::Duration::milliseconds(self.offset_ms()))
            }
            _ => None,
        }
    }
}

/// When a node fires.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleSpec {
    /// Every period, starting one period from now.
    Periodic(IntervalSpec),
    /// At each occurrence of a time reference.
    At(TimeSpec),
    /// Every period while between `start` and `end`.
    Window {
        start: TimeSpec,
        end: TimeSpec,
        interval: IntervalSpec,
    },
}

impl ScheduleSpec {
    pub fn start_spec(&self) -> Option<&TimeSpec> {
        match self {
            Self::Periodic(_) => None,
            Self::At(spec) | Self::Window { start: spec, .. } => Some(spec),
        }
    }

    pub fn interval(&self) -> Option<&IntervalSpec> {
        match self {
            Self::Periodic(interval) | Self::Window { interval, .. } => Some(interval),
            Self::At(_) => None,
        }
    }
}

/// Everything one recurring node needs to schedule itself.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    pub schedule: ScheduleSpec,
    /// Emit once this many ms after start.
    pub once_delay_ms: Option<u64>,
    pub date_range: Option<super::DateRange>,
}

impl ScheduleConfig {
    pub fn new(schedule: ScheduleSpec) -> Self {
        Self {
            schedule,
            once_delay_ms: None,
            date_range: None,
        }
    }
}
