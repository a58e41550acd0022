//! Low-precision positional astronomy.
//!
//! Pure functions over days since J2000 (`d`), Julian days, and radians. The
//! series are the usual short-form solar and lunar ephemerides; constants are
//! fixed epoch values and must not be "improved" without re-validating the
//! reference times in the tests.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::f64::consts::PI;

use super::DayBoundary;

/// Degrees to radians.
pub const RAD: f64 = PI / 180.0;

const DAY_MS: f64 = 86_400_000.0;
const J1970: f64 = 2_440_588.0;
pub const J2000: f64 = 2_451_545.0;

/// Obliquity of the Earth's axis.
const OBLIQUITY: f64 = RAD * 23.4397;

/// Perihelion of the Earth.
const PERIHELION: f64 = RAD * 102.9372;

/// Julian cycle correction.
const J0: f64 = 0.0009;

/// Equatorial coordinates of a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CelestialCoordinates {
    /// Declination in radians.
    pub declination: f64,
    /// Right ascension in radians.
    pub right_ascension: f64,
    /// Distance to the observer in kilometres (moon only).
    pub distance_km: Option<f64>,
}

/// Horizontal coordinates in radians; azimuth measured from south, westward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizontal {
    pub azimuth: f64,
    pub altitude: f64,
}

// # Date conversion

/// Julian day of an instant.
pub fn to_julian(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_millis() as f64 / DAY_MS - 0.5 + J1970
}

/// Instant of a Julian day, rounded to the millisecond.
pub fn from_julian(julian: f64) -> DateTime<Utc> {
    let millis = ((julian + 0.5 - J1970) * DAY_MS).round() as i64;
    DateTime::<Utc>::UNIX_EPOCH + Duration::milliseconds(millis)
}

/// Continuous days since 2000-01-01T12:00Z.
pub fn to_days(instant: DateTime<Utc>) -> f64 {
    to_julian(instant) - J2000
}

/// Days since J2000 of the start of `instant`'s calendar day.
///
/// With [`DayBoundary::Utc`] the day starts at 00:00Z; with a zone it starts at
/// local midnight of the date the instant falls on in that zone.
pub fn days_since_epoch(instant: DateTime<Utc>, boundary: &DayBoundary) -> f64 {
    let date = boundary.date_of(instant);
    to_days(boundary.at(date, NaiveTime::MIN))
}

/// Noon of a calendar date under the given day boundary.
pub fn noon_of(date: NaiveDate, boundary: &DayBoundary) -> DateTime<Utc> {
    boundary.at(date, NaiveTime::from_hms_opt(12, 0, 0).unwrap_or(NaiveTime::MIN))
}

// # General calculations for position

pub fn right_ascension(l: f64, b: f64) -> f64 {
    (l.sin() * OBLIQUITY.cos() - b.tan() * OBLIQUITY.sin()).atan2(l.cos())
}

pub fn declination(l: f64, b: f64) -> f64 {
    (b.sin() * OBLIQUITY.cos() + b.cos() * OBLIQUITY.sin() * l.sin()).asin()
}

pub fn azimuth(hour_angle: f64, phi: f64, dec: f64) -> f64 {
    hour_angle
        .sin()
        .atan2(hour_angle.cos() * phi.sin() - dec.tan() * phi.cos())
}

pub fn altitude(hour_angle: f64, phi: f64, dec: f64) -> f64 {
    (phi.sin() * dec.sin() + phi.cos() * dec.cos() * hour_angle.cos()).asin()
}

/// Horizontal position from hour angle, observer latitude, and declination.
pub fn horizontal_position(hour_angle: f64, phi: f64, dec: f64) -> Horizontal {
    Horizontal {
        azimuth: azimuth(hour_angle, phi, dec),
        altitude: altitude(hour_angle, phi, dec),
    }
}

/// Local sidereal time; `lw` is the west longitude in radians.
pub fn sidereal_time(d: f64, lw: f64) -> f64 {
    RAD * (280.16 + 360.985_623_5 * d) - lw
}

/// Atmospheric refraction for an altitude in radians.
///
/// Negative altitudes are clamped to the horizon; the formula diverges below it.
pub fn astro_refraction(h: f64) -> f64 {
    let h = h.max(0.0);
    0.000_296_7 / (h + 0.003_125_36 / (h + 0.089_011_79)).tan()
}

// # General sun calculations

pub fn solar_mean_anomaly(d: f64) -> f64 {
    RAD * (357.5291 + 0.985_600_28 * d)
}

pub fn ecliptic_longitude(m: f64) -> f64 {
    // equation of center
    let c = RAD * (1.9148 * m.sin() + 0.02 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin());
    m + c + PERIHELION + PI
}

pub fn sun_coords(d: f64) -> CelestialCoordinates {
    let l = ecliptic_longitude(solar_mean_anomaly(d));
    CelestialCoordinates {
        declination: declination(l, 0.0),
        right_ascension: right_ascension(l, 0.0),
        distance_km: None,
    }
}

// # Sun rise/set helpers

pub fn julian_cycle(d: f64, lw: f64) -> f64 {
    (d - J0 - lw / (2.0 * PI)).round()
}

pub fn approx_transit(ht: f64, lw: f64, n: f64) -> f64 {
    J0 + (ht + lw) / (2.0 * PI) + n
}

pub fn solar_transit_j(ds: f64, m: f64, l: f64) -> f64 {
    J2000 + ds + 0.0053 * m.sin() - 0.0069 * (2.0 * l).sin()
}

/// Hour angle at which the body reaches altitude `h`; NaN when it never does.
pub fn hour_angle(h: f64, phi: f64, dec: f64) -> f64 {
    ((h.sin() - phi.sin() * dec.sin()) / (phi.cos() * dec.cos())).acos()
}

/// Julian day of the evening crossing of altitude `h`, NaN when there is none.
#[allow(clippy::too_many_arguments)]
pub fn set_julian(h: f64, lw: f64, phi: f64, dec: f64, n: f64, m: f64, l: f64) -> f64 {
    let w = hour_angle(h, phi, dec);
    let a = approx_transit(w, lw, n);
    solar_transit_j(a, m, l)
}

// # Moon calculations

/// Geocentric ecliptic coordinates of the moon, converted to equatorial.
pub fn moon_coords(d: f64) -> CelestialCoordinates {
    let l0 = RAD * (218.316 + 13.176_396 * d); // ecliptic longitude
    let m = RAD * (134.963 + 13.064_993 * d); // mean anomaly
    let f = RAD * (93.272 + 13.229_350 * d); // mean distance

    let l = l0 + RAD * 6.289 * m.sin(); // longitude
    let b = RAD * 5.128 * f.sin(); // latitude
    let dt = 385_001.0 - 20_905.0 * m.cos(); // distance in km

    CelestialCoordinates {
        declination: declination(l, b),
        right_ascension: right_ascension(l, b),
        distance_km: Some(dt),
    }
}
