//! Sun position and the daily table of named sun events.
//!
//! The table is built around one solar transit per day: `solarNoon` and
//! `nadir` are always present, and each configured altitude band contributes a
//! morning and an evening event mirrored around noon.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::math::{self, RAD};
use super::{DayBoundary, GeoCoordinate};

/// Named sun events of the daily table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SunEvent {
    AstronomicalDawn,
    AmateurDawn,
    NauticalDawn,
    BlueHourDawnStart,
    CivilDawn,
    BlueHourDawnEnd,
    GoldenHourDawnStart,
    SunriseStart,
    SunriseEnd,
    GoldenHourDawnEnd,
    SolarNoon,
    GoldenHourDuskStart,
    SunsetStart,
    SunsetEnd,
    GoldenHourDuskEnd,
    BlueHourDuskStart,
    CivilDusk,
    BlueHourDuskEnd,
    NauticalDusk,
    AmateurDusk,
    AstronomicalDusk,
    Nadir,
}

/// Altitude bands in degrees with their morning and evening event.
pub const SUN_BANDS: [(f64, SunEvent, SunEvent); 10] = [
    (6.0, SunEvent::GoldenHourDawnEnd, SunEvent::GoldenHourDuskStart),
    (-0.3, SunEvent::SunriseEnd, SunEvent::SunsetStart),
    (-0.833, SunEvent::SunriseStart, SunEvent::SunsetEnd),
    (-1.0, SunEvent::GoldenHourDawnStart, SunEvent::GoldenHourDuskEnd),
    (-4.0, SunEvent::BlueHourDawnEnd, SunEvent::BlueHourDuskStart),
    (-6.0, SunEvent::CivilDawn, SunEvent::CivilDusk),
    (-8.0, SunEvent::BlueHourDawnStart, SunEvent::BlueHourDuskEnd),
    (-12.0, SunEvent::NauticalDawn, SunEvent::NauticalDusk),
    (-15.0, SunEvent::AmateurDawn, SunEvent::AmateurDusk),
    (-18.0, SunEvent::AstronomicalDawn, SunEvent::AstronomicalDusk),
];

/// Older event names kept for existing flows.
pub const LEGACY_ALIASES: [(&str, SunEvent); 10] = [
    ("dawn", SunEvent::CivilDawn),
    ("dusk", SunEvent::CivilDusk),
    ("nightEnd", SunEvent::AstronomicalDawn),
    ("night", SunEvent::AstronomicalDusk),
    ("nightStart", SunEvent::AstronomicalDusk),
    ("goldenHour", SunEvent::GoldenHourDuskStart),
    ("sunrise", SunEvent::SunriseStart),
    ("sunset", SunEvent::SunsetEnd),
    ("goldenHourEnd", SunEvent::GoldenHourDawnEnd),
    ("goldenHourStart", SunEvent::GoldenHourDuskStart),
];

const SOLAR_NOON_ANGLE: f64 = 90.0;
const NADIR_ANGLE: f64 = 270.0;

impl SunEvent {
    pub const ALL: [SunEvent; 22] = [
        Self::AstronomicalDawn,
        Self::AmateurDawn,
        Self::NauticalDawn,
        Self::BlueHourDawnStart,
        Self::CivilDawn,
        Self::BlueHourDawnEnd,
        Self::GoldenHourDawnStart,
        Self::SunriseStart,
        Self::SunriseEnd,
        Self::GoldenHourDawnEnd,
        Self::SolarNoon,
        Self::GoldenHourDuskStart,
        Self::SunsetStart,
        Self::SunsetEnd,
        Self::GoldenHourDuskEnd,
        Self::BlueHourDuskStart,
        Self::CivilDusk,
        Self::BlueHourDuskEnd,
        Self::NauticalDusk,
        Self::AmateurDusk,
        Self::AstronomicalDusk,
        Self::Nadir,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::AstronomicalDawn => "astronomicalDawn",
            Self::AmateurDawn => "amateurDawn",
            Self::NauticalDawn => "nauticalDawn",
            Self::BlueHourDawnStart => "blueHourDawnStart",
            Self::CivilDawn => "civilDawn",
            Self::BlueHourDawnEnd => "blueHourDawnEnd",
            Self::GoldenHourDawnStart => "goldenHourDawnStart",
            Self::SunriseStart => "sunriseStart",
            Self::SunriseEnd => "sunriseEnd",
            Self::GoldenHourDawnEnd => "goldenHourDawnEnd",
            Self::SolarNoon => "solarNoon",
            Self::GoldenHourDuskStart => "goldenHourDuskStart",
            Self::SunsetStart => "sunsetStart",
            Self::SunsetEnd => "sunsetEnd",
            Self::GoldenHourDuskEnd => "goldenHourDuskEnd",
            Self::BlueHourDuskStart => "blueHourDuskStart",
            Self::CivilDusk => "civilDusk",
            Self::BlueHourDuskEnd => "blueHourDuskEnd",
            Self::NauticalDusk => "nauticalDusk",
            Self::AmateurDusk => "amateurDusk",
            Self::AstronomicalDusk => "astronomicalDusk",
            Self::Nadir => "nadir",
        }
    }
}

impl fmt::Display for SunEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SunEvent {
    type Err = String;

    /// Accepts canonical names and legacy aliases, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|event| event.name().eq_ignore_ascii_case(s))
            .or_else(|| {
                LEGACY_ALIASES
                    .iter()
                    .find(|(alias, _)| alias.eq_ignore_ascii_case(s))
                    .map(|(_, event)| event)
            })
            .copied()
            .ok_or_else(|| format!("unknown sun event '{s}'"))
    }
}

/// One entry of the sun time table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SunTimeEvent {
    pub name: SunEvent,
    pub value: DateTime<Utc>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Sun altitude of the event in degrees (90 for noon, 270 for nadir).
    pub angle: f64,
    pub julian: f64,
    /// False when the sun never reaches `angle` on this day. The value is then a
    /// placeholder (nadir for evening events, the previous nadir for morning ones).
    pub valid: bool,
}

impl SunTimeEvent {
    fn new(name: SunEvent, julian: f64, angle: f64, valid: bool) -> Self {
        let value = math::from_julian(julian);
        Self {
            name,
            value,
            timestamp: value.timestamp_millis(),
            angle,
            julian,
            valid,
        }
    }
}

/// Options for building a sun time table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunTimesOptions {
    /// Observer height above the horizon in metres (lowers the visible horizon).
    pub height_m: f64,
    /// Include the legacy alias names in [`SunTimes::entries`].
    pub legacy_names: bool,
}

impl Default for SunTimesOptions {
    fn default() -> Self {
        Self {
            height_m: 0.0,
            legacy_names: true,
        }
    }
}

/// Complete set of sun events for one location and calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SunTimes {
    pub date: NaiveDate,
    events: BTreeMap<SunEvent, SunTimeEvent>,
    #[serde(skip)]
    legacy_names: bool,
}

impl SunTimes {
    /// Table entry for an event.
    pub fn get(&self, event: SunEvent) -> Option<&SunTimeEvent> {
        self.events.get(&event)
    }

    /// Table entry by canonical or legacy name.
    pub fn by_name(&self, name: &str) -> Option<&SunTimeEvent> {
        name.parse::<SunEvent>().ok().and_then(|event| self.get(event))
    }

    pub fn solar_noon(&self) -> Option<&SunTimeEvent> {
        self.get(SunEvent::SolarNoon)
    }

    pub fn nadir(&self) -> Option<&SunTimeEvent> {
        self.get(SunEvent::Nadir)
    }

    /// Entries in chronological table order.
    pub fn events(&self) -> impl Iterator<Item = &SunTimeEvent> {
        self.events.values()
    }

    /// Named entries, followed by the legacy aliases when enabled.
    pub fn entries(&self) -> Vec<(&'static str, &SunTimeEvent)> {
        let mut entries: Vec<_> = self.events.values().map(|e| (e.name.name(), e)).collect();
        if self.legacy_names {
            entries.extend(
                LEGACY_ALIASES
                    .iter()
                    .filter_map(|(alias, event)| self.events.get(event).map(|e| (*alias, e))),
            );
        }
        entries
    }
}

/// Dip of the horizon for an observer `height_m` above ground, in degrees.
fn observer_angle(height_m: f64) -> f64 {
    -2.076 * height_m.max(0.0).sqrt() / 60.0
}

/// Sun time table for the calendar day of `date` with default options.
pub fn compute_sun_times(
    date: DateTime<Utc>,
    coord: &GeoCoordinate,
    boundary: &DayBoundary,
) -> SunTimes {
    compute_sun_times_with(date, coord, boundary, &SunTimesOptions::default())
}

/// Sun time table for the calendar day of `date`.
///
/// The day is anchored at noon of `date`'s calendar day under `boundary`. Bands
/// the sun never reaches are marked invalid and carry the nadir placeholder.
pub fn compute_sun_times_with(
    date: DateTime<Utc>,
    coord: &GeoCoordinate,
    boundary: &DayBoundary,
    options: &SunTimesOptions,
) -> SunTimes {
    let day = boundary.date_of(date);
    let lw = coord.lw();
    let phi = coord.phi();
    let dh = observer_angle(options.height_m);

    let d = math::to_days(math::noon_of(day, boundary));
    let n = math::julian_cycle(d, lw);
    let ds = math::approx_transit(0.0, lw, n);

    let m = math::solar_mean_anomaly(ds);
    let l = math::ecliptic_longitude(m);
    let dec = math::declination(l, 0.0);

    let j_noon = math::solar_transit_j(ds, m, l);

    let mut events = BTreeMap::new();
    events.insert(
        SunEvent::SolarNoon,
        SunTimeEvent::new(SunEvent::SolarNoon, j_noon, SOLAR_NOON_ANGLE, true),
    );
    events.insert(
        SunEvent::Nadir,
        SunTimeEvent::new(SunEvent::Nadir, j_noon + 0.5, NADIR_ANGLE, true),
    );

    for (angle, morning, evening) in SUN_BANDS {
        let mut j_set = math::set_julian((angle + dh) * RAD, lw, phi, dec, n, m, l);
        let valid = !j_set.is_nan();
        if !valid {
            j_set = j_noon + 0.5;
        }
        let j_rise = j_noon - (j_set - j_noon);

        events.insert(morning, SunTimeEvent::new(morning, j_rise, angle, valid));
        events.insert(evening, SunTimeEvent::new(evening, j_set, angle, valid));
    }

    SunTimes {
        date: day,
        events,
        legacy_names: options.legacy_names,
    }
}

/// Sun position at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SunPosition {
    /// Radians from south, westward.
    pub azimuth: f64,
    /// Radians above the horizon, without refraction.
    pub altitude: f64,
    pub zenith: f64,
    /// Degrees from north, clockwise.
    pub azimuth_degrees: f64,
    pub altitude_degrees: f64,
    pub declination: f64,
}

pub fn sun_position(instant: DateTime<Utc>, coord: &GeoCoordinate) -> SunPosition {
    let d = math::to_days(instant);
    let c = math::sun_coords(d);
    let h = math::sidereal_time(d, coord.lw()) - c.right_ascension;
    let pos = math::horizontal_position(h, coord.phi(), c.declination);

    SunPosition {
        azimuth: pos.azimuth,
        altitude: pos.altitude,
        zenith: std::f64::consts::FRAC_PI_2 - pos.altitude,
        azimuth_degrees: 180.0 + pos.azimuth / RAD,
        altitude_degrees: pos.altitude / RAD,
        declination: c.declination,
    }
}
