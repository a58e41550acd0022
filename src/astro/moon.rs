//! Moon position, illumination, and rise/set times.
//!
//! Rise and set cannot be solved in closed form like the sun's because the
//! moon moves noticeably during the day. Instead the altitude is sampled hourly
//! and a parabola is fitted through each pair of consecutive hours plus the
//! previous sample; zero crossings of the parabola are the events.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::fmt;

use super::math::{self, RAD};
use super::{DayBoundary, GeoCoordinate};
use crate::common::constants::{MOON_HORIZON_CORRECTION_DEG, SUN_DISTANCE_KM};

/// Moon position at an instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoonPosition {
    /// Radians from south, westward.
    pub azimuth: f64,
    /// Radians above the horizon, corrected for refraction.
    pub altitude: f64,
    /// Kilometres.
    pub distance: f64,
    pub parallactic_angle: f64,
}

pub fn moon_position(instant: DateTime<Utc>, coord: &GeoCoordinate) -> MoonPosition {
    let phi = coord.phi();
    let d = math::to_days(instant);
    let c = math::moon_coords(d);
    let h = math::sidereal_time(d, coord.lw()) - c.right_ascension;
    let pos = math::horizontal_position(h, phi, c.declination);

    // Meeus, Astronomical Algorithms, formula 14.1
    let parallactic_angle = h
        .sin()
        .atan2(phi.tan() * c.declination.cos() - c.declination.sin() * h.cos());

    MoonPosition {
        azimuth: pos.azimuth,
        altitude: pos.altitude + math::astro_refraction(pos.altitude),
        distance: c.distance_km.unwrap_or_default(),
        parallactic_angle,
    }
}

/// Named lunar phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MoonPhase {
    NewMoon,
    WaxingCrescent,
    FirstQuarter,
    WaxingGibbous,
    FullMoon,
    WaningGibbous,
    ThirdQuarter,
    WaningCrescent,
}

impl MoonPhase {
    /// Phase name for a phase value in `[0, 1)`.
    pub fn from_phase(phase: f64) -> Self {
        match phase {
            p if p < 0.01 => Self::NewMoon,
            p if p < 0.25 => Self::WaxingCrescent,
            p if p < 0.26 => Self::FirstQuarter,
            p if p < 0.49 => Self::WaxingGibbous,
            p if p < 0.51 => Self::FullMoon,
            p if p < 0.74 => Self::WaningGibbous,
            p if p < 0.76 => Self::ThirdQuarter,
            p if p < 0.99 => Self::WaningCrescent,
            _ => Self::NewMoon,
        }
    }
}

impl fmt::Display for MoonPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NewMoon => "new moon",
            Self::WaxingCrescent => "waxing crescent",
            Self::FirstQuarter => "first quarter",
            Self::WaxingGibbous => "waxing gibbous",
            Self::FullMoon => "full moon",
            Self::WaningGibbous => "waning gibbous",
            Self::ThirdQuarter => "third quarter",
            Self::WaningCrescent => "waning crescent",
        };
        f.write_str(name)
    }
}

/// Illuminated part of the moon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoonIllumination {
    /// Illuminated fraction in `[0, 1]`.
    pub fraction: f64,
    /// 0 new, 0.25 first quarter, 0.5 full, 0.75 third quarter.
    pub phase: f64,
    /// Midpoint angle of the illuminated limb in radians.
    pub angle: f64,
    pub phase_name: MoonPhase,
}

pub fn moon_illumination(instant: DateTime<Utc>) -> MoonIllumination {
    let d = math::to_days(instant);
    let s = math::sun_coords(d);
    let m = math::moon_coords(d);
    let m_dist = m.distance_km.unwrap_or_default();

    let phi = (s.declination.sin() * m.declination.sin()
        + s.declination.cos() * m.declination.cos() * (s.right_ascension - m.right_ascension).cos())
    .acos();
    let inc = (SUN_DISTANCE_KM * phi.sin()).atan2(m_dist - SUN_DISTANCE_KM * phi.cos());
    let angle = (s.declination.cos() * (s.right_ascension - m.right_ascension).sin()).atan2(
        s.declination.sin() * m.declination.cos()
            - s.declination.cos()
                * m.declination.sin()
                * (s.right_ascension - m.right_ascension).cos(),
    );

    let sign = if angle < 0.0 { -1.0 } else { 1.0 };
    let phase = 0.5 + 0.5 * inc * sign / std::f64::consts::PI;

    MoonIllumination {
        fraction: (1.0 + inc.cos()) / 2.0,
        phase,
        angle,
        phase_name: MoonPhase::from_phase(phase),
    }
}

/// Moon rise and set for one calendar day.
///
/// Either at least one of `rise`/`set` is present, or exactly one of
/// `always_up`/`always_down` is set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MoonTimes {
    pub rise: Option<DateTime<Utc>>,
    pub set: Option<DateTime<Utc>>,
    pub always_up: bool,
    pub always_down: bool,
}

/// Crossings of one two-hour bracket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BracketRoots {
    pub rise: Option<f64>,
    pub set: Option<f64>,
    /// Altitude at the parabola's extremum.
    pub ye: f64,
}

/// Fit a parabola through `h0`, `h1`, `h2` (at x = -1, 0, 1) and classify its roots.
///
/// One root is a rise when the bracket starts below the horizon. With two roots
/// the sign of the extremum decides the order: a negative minimum means the
/// moon sets first and rises again within the bracket.
pub(crate) fn classify_bracket(h0: f64, h1: f64, h2: f64) -> BracketRoots {
    let a = (h0 + h2) / 2.0 - h1;
    let b = (h2 - h0) / 2.0;

    // Straight line through the bracket: at most one crossing
    if a.abs() < f64::EPSILON {
        let root = if b == 0.0 { None } else { Some(-h1 / b) };
        let x = root.filter(|x| x.abs() <= 1.0);
        return BracketRoots {
            rise: x.filter(|_| h0 < 0.0),
            set: x.filter(|_| h0 >= 0.0),
            ye: h1,
        };
    }

    let xe = -b / (2.0 * a);
    let ye = (a * xe + b) * xe + h1;
    let d = b * b - 4.0 * a * h1;

    let mut roots = 0;
    let (mut x1, mut x2) = (0.0, 0.0);
    if d >= 0.0 {
        let dx = d.sqrt() / (a.abs() * 2.0);
        x1 = xe - dx;
        x2 = xe + dx;
        if x1.abs() <= 1.0 {
            roots += 1;
        }
        if x2.abs() <= 1.0 {
            roots += 1;
        }
        if x1 < -1.0 {
            x1 = x2;
        }
    }

    match roots {
        1 if h0 < 0.0 => BracketRoots {
            rise: Some(x1),
            set: None,
            ye,
        },
        1 => BracketRoots {
            rise: None,
            set: Some(x1),
            ye,
        },
        2 => BracketRoots {
            rise: Some(if ye < 0.0 { x2 } else { x1 }),
            set: Some(if ye < 0.0 { x1 } else { x2 }),
            ye,
        },
        _ => BracketRoots {
            rise: None,
            set: None,
            ye,
        },
    }
}

fn hours_later(instant: DateTime<Utc>, hours: f64) -> DateTime<Utc> {
    instant + Duration::milliseconds((hours * 3_600_000.0).round() as i64)
}

/// Moon rise and set on the calendar day of `date`.
///
/// Brackets are centred on hours 1, 3, ... 25 after the start of the day; the
/// scan stops once both a rise and a set were found.
pub fn compute_moon_times(
    date: DateTime<Utc>,
    coord: &GeoCoordinate,
    boundary: &DayBoundary,
) -> MoonTimes {
    let start = boundary.start_of_day(date);
    let hc = MOON_HORIZON_CORRECTION_DEG * RAD;
    let altitude_at = |hours: f64| moon_position(hours_later(start, hours), coord).altitude - hc;

    let mut h0 = altitude_at(0.0);
    let mut rise: Option<f64> = None;
    let mut set: Option<f64> = None;
    let mut ye = 0.0;

    for i in (1..=25).step_by(2) {
        let hour = f64::from(i);
        let h1 = altitude_at(hour);
        let h2 = altitude_at(hour + 1.0);

        let bracket = classify_bracket(h0, h1, h2);
        ye = bracket.ye;
        if let Some(x) = bracket.rise {
            rise = Some(hour + x);
        }
        if let Some(x) = bracket.set {
            set = Some(hour + x);
        }

        if rise.is_some() && set.is_some() {
            break;
        }
        h0 = h2;
    }

    let neither = rise.is_none() && set.is_none();
    MoonTimes {
        rise: rise.map(|h| hours_later(start, h)),
        set: set.map(|h| hours_later(start, h)),
        always_up: neither && ye > 0.0,
        always_down: neither && ye <= 0.0,
    }
}
