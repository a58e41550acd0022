//! Sun and moon position and event-time calculations.
//!
//! ## Module Structure
//!
//! - [`math`]: Julian-day conversion and the positional formulas everything else builds on
//! - [`sun`]: Sun position and the named time table (twilight bands, noon, nadir)
//! - [`moon`]: Moon position, illumination, and the rise/set search
//! - [`cache`]: Per location and day memoization of computed tables
//!
//! Inputs are validated once at the [`GeoCoordinate`] boundary; the formulas
//! themselves are total over valid coordinates.

pub mod cache;
pub mod math;
pub mod moon;
pub mod sun;

pub use cache::AstroCache;
pub use moon::{MoonIllumination, MoonPhase, MoonPosition, MoonTimes};
pub use sun::{SunEvent, SunPosition, SunTimeEvent, SunTimes};


use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use math::RAD;

/// Observer location in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinate {
    latitude: f64,
    longitude: f64,
}

impl GeoCoordinate {
    /// Validate and build a coordinate. NaN or out-of-range values are rejected.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid = (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(Error::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Latitude in radians.
    pub(crate) fn phi(&self) -> f64 {
        RAD * self.latitude
    }

    /// West longitude in radians, as the formulas expect it.
    pub(crate) fn lw(&self) -> f64 {
        RAD * -self.longitude
    }
}

impl fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}°, {:.4}°", self.latitude, self.longitude)
    }
}

/// Which calendar a "day" refers to when anchoring daily calculations.
///
/// `Utc` reproduces the `useUTC` behaviour; `Zone` anchors days at local
/// midnight of the configured zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum DayBoundary {
    Utc,
    Zone(Tz),
}

impl DayBoundary {
    /// Calendar date of an instant.
    pub fn date_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        match self {
            Self::Utc => instant.date_naive(),
            Self::Zone(tz) => instant.with_timezone(tz).date_naive(),
        }
    }

    /// Instant of a wall-clock time on a date.
    ///
    /// Ambiguous local times (DST fall-back) take the earlier mapping; times in a
    /// DST gap move forward by one hour.
    pub fn at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let naive = date.and_time(time);
        match self {
            Self::Utc => naive.and_utc(),
            Self::Zone(tz) => tz
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
                .map(|dt| dt.with_timezone(&Utc))
                // Zones never skip two hours in a row; keep the naive reading as a last resort
                .unwrap_or_else(|| naive.and_utc()),
        }
    }

    /// Start of the calendar day containing `instant`.
    pub fn start_of_day(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        self.at(self.date_of(instant), NaiveTime::MIN)
    }

    /// Parse `YYYY-MM-DD HH:MM:SS` as wall-clock time of this boundary's zone.
    pub fn parse_datetime(&self, s: &str) -> std::result::Result<DateTime<Utc>, String> {
        match self {
            Self::Utc => crate::time::parse_datetime(s),
            Self::Zone(tz) => crate::time::parse_datetime_in(s, tz),
        }
    }
}

impl FromStr for DayBoundary {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("utc") {
            return Ok(Self::Utc);
        }
        s.parse::<Tz>()
            .map(Self::Zone)
            .map_err(|_| format!("unknown time zone '{s}' (use \"utc\" or an IANA name)"))
    }
}

impl TryFrom<String> for DayBoundary {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for DayBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc => write!(f, "UTC"),
            Self::Zone(tz) => write!(f, "{tz}"),
        }
    }
}
