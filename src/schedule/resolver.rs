//! Turning time references into concrete instants.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;

use super::spec::{MoonEvent, TimeKind, TimeSpec};
use crate::astro::{AstroCache, DayBoundary, GeoCoordinate};
use crate::common::constants::MAX_RESOLVE_SEARCH_DAYS;
use crate::error::{Error, Result};

/// A resolved time reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedTime {
    pub value: DateTime<Utc>,
    /// The value will not drift between recomputations.
    pub is_fixed: bool,
}

/// Resolves a [`TimeSpec`] to its next occurrence after `now`.
#[cfg_attr(test, mockall::automock)]
pub trait TimeResolver {
    fn resolve(&self, spec: &TimeSpec, now: DateTime<Utc>) -> Result<ResolvedTime>;
}

/// Resolver backed by the sun and moon tables of one location.
pub struct AstroResolver {
    coord: GeoCoordinate,
    boundary: DayBoundary,
    cache: Arc<AstroCache>,
}

impl AstroResolver {
    pub fn new(coord: GeoCoordinate, boundary: DayBoundary, cache: Arc<AstroCache>) -> Self {
        Self {
            coord,
            boundary,
            cache,
        }
    }

    pub fn boundary(&self) -> &DayBoundary {
        &self.boundary
    }

    /// Base instant of `kind` on `day`, before the offset. `None` when the
    /// event does not happen that day.
    fn base_on(&self, kind: &TimeKind, day: NaiveDate) -> Option<DateTime<Utc>> {
        match kind {
            TimeKind::Sun(event) => self
                .cache
                .sun_times(&self.coord, &self.boundary, day)
                .get(*event)
                .filter(|entry| entry.valid)
                .map(|entry| entry.value),
            TimeKind::Moon(event) => {
                let moon = self.cache.moon_times(&self.coord, &self.boundary, day);
                match event {
                    MoonEvent::Rise => moon.rise,
                    MoonEvent::Set => moon.set,
                }
            }
            TimeKind::TimeOfDay(time) => Some(self.boundary.at(day, *time)),
            TimeKind::Absolute(instant) => Some(*instant),
        }
    }
}

impl TimeResolver for AstroResolver {
    fn resolve(&self, spec: &TimeSpec, now: DateTime<Utc>) -> Result<ResolvedTime> {
        let offset = Duration::milliseconds(spec.offset_ms());

        if let TimeKind::Absolute(instant) = spec.kind {
            let value = instant + offset;
            if value <= now {
                return Err(Error::UnresolvableTime(format!(
                    "{} lies in the past",
                    spec.kind
                )));
            }
            return Ok(ResolvedTime {
                value,
                is_fixed: true,
            });
        }

        // Start a day early: yesterday's event plus a positive offset can still be ahead
        let first_day = self.boundary.date_of(now) - Duration::days(1);
        self.cache.roll_to(first_day);
        let is_fixed = matches!(spec.kind, TimeKind::TimeOfDay(_));

        for day in first_day.iter_days().take(MAX_RESOLVE_SEARCH_DAYS as usize + 1) {
            let Some(base) = self.base_on(&spec.kind, day) else {
                continue;
            };
            let value = base + offset;
            if value > now && spec.filter.accepts(self.boundary.date_of(value)) {
                return Ok(ResolvedTime { value, is_fixed });
            }
        }

        Err(Error::UnresolvableTime(format!(
            "no {} within {} days of {}",
            spec.kind,
            MAX_RESOLVE_SEARCH_DAYS,
            now.format("%Y-%m-%d")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::SunEvent;
    use crate::schedule::spec::{DayFilter, DayParity, TimeUnit};
    use chrono::{NaiveTime, TimeZone, Weekday};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn resolver(lat: f64, lon: f64, boundary: DayBoundary) -> AstroResolver {
        AstroResolver::new(
            GeoCoordinate::new(lat, lon).unwrap(),
            boundary,
            Arc::new(AstroCache::default()),
        )
    }

    fn time_of_day(h: u32, m: u32) -> TimeSpec {
        TimeSpec::new(TimeKind::TimeOfDay(NaiveTime::from_hms_opt(h, m, 0).unwrap()))
    }

    #[test]
    fn test_time_of_day_today_or_tomorrow() {
        let r = resolver(52.52, 13.405, DayBoundary::Utc);
        let spec = time_of_day(22, 0);

        let resolved = r.resolve(&spec, utc(2024, 5, 10, 12, 0)).unwrap();
        assert_eq!(resolved.value, utc(2024, 5, 10, 22, 0));
        assert!(resolved.is_fixed);

        let resolved = r.resolve(&spec, utc(2024, 5, 10, 23, 0)).unwrap();
        assert_eq!(resolved.value, utc(2024, 5, 11, 22, 0));

        // Exactly at the event means the next one
        let resolved = r.resolve(&spec, utc(2024, 5, 10, 22, 0)).unwrap();
        assert_eq!(resolved.value, utc(2024, 5, 11, 22, 0));
    }

    #[test]
    fn test_time_of_day_in_zone_across_dst() {
        let berlin = DayBoundary::Zone(chrono_tz::Europe::Berlin);
        let r = resolver(52.52, 13.405, berlin);
        let spec = time_of_day(7, 0);

        // 07:00 CET on Mar 30, then 07:00 CEST on Mar 31
        let first = r.resolve(&spec, utc(2024, 3, 30, 0, 0)).unwrap();
        assert_eq!(first.value, utc(2024, 3, 30, 6, 0));
        let second = r.resolve(&spec, first.value).unwrap();
        assert_eq!(second.value, utc(2024, 3, 31, 5, 0));
    }

    #[test]
    fn test_sun_event_with_offset() {
        let r = resolver(52.52, 13.405, DayBoundary::Utc);
        let sunrise = TimeSpec::new(TimeKind::Sun(SunEvent::SunriseStart));
        let early = sunrise.clone().with_offset(-30.0, TimeUnit::Minutes);

        let now = utc(2024, 3, 31, 0, 0);
        let plain = r.resolve(&sunrise, now).unwrap();
        let shifted = r.resolve(&early, now).unwrap();
        assert!(!plain.is_fixed);
        assert_eq!(plain.value - shifted.value, Duration::minutes(30));
        // Sunrise in Berlin on 2024-03-31 is at 04:43:41Z
        assert!((plain.value - (utc(2024, 3, 31, 4, 43) + Duration::seconds(41))).num_seconds().abs() <= 60);
    }

    #[test]
    fn test_positive_offset_reaches_back_a_day() {
        let r = resolver(52.52, 13.405, DayBoundary::Utc);
        // Yesterday's dusk plus 10 hours is still ahead at 01:00
        let spec = TimeSpec::new(TimeKind::Sun(SunEvent::CivilDusk)).with_offset(10.0, TimeUnit::Hours);
        let now = utc(2024, 3, 31, 1, 0);
        let resolved = r.resolve(&spec, now).unwrap();
        assert_eq!(resolved.value.date_naive(), now.date_naive());
        assert!(resolved.value > now);
    }

    #[test]
    fn test_invalid_sun_days_are_skipped() {
        // Longyearbyen: no astronomical dusk in midsummer
        let r = resolver(78.2, 15.6, DayBoundary::Utc);
        let spec = TimeSpec::new(TimeKind::Sun(SunEvent::AstronomicalDusk));
        let resolved = r.resolve(&spec, utc(2024, 6, 21, 12, 0)).unwrap();
        assert!(resolved.value > utc(2024, 8, 1, 0, 0));
    }

    #[test]
    fn test_polar_night_sunrise_is_found_after_months() {
        let r = resolver(78.2, 15.6, DayBoundary::Utc);
        let spec = TimeSpec::new(TimeKind::Sun(SunEvent::SunriseStart));
        let resolved = r.resolve(&spec, utc(2024, 11, 15, 12, 0)).unwrap();
        assert!(resolved.value > utc(2025, 2, 1, 0, 0));
        assert!(resolved.value < utc(2025, 3, 15, 0, 0));
    }

    #[test]
    fn test_moon_event() {
        let r = resolver(52.0, 13.0, DayBoundary::Utc);
        let spec = TimeSpec::new(TimeKind::Moon(MoonEvent::Rise));
        let resolved = r.resolve(&spec, utc(2018, 11, 1, 12, 0)).unwrap();
        let expected = utc(2018, 11, 1, 23, 1) + Duration::seconds(59);
        assert!((resolved.value - expected).num_seconds().abs() <= 60);
    }

    #[test]
    fn test_day_filters() {
        let r = resolver(52.52, 13.405, DayBoundary::Utc);
        // 2024-05-10 is a Friday
        let weekend = time_of_day(9, 0).with_filter(DayFilter {
            weekdays: vec![Weekday::Sat, Weekday::Sun],
            ..Default::default()
        });
        let resolved = r.resolve(&weekend, utc(2024, 5, 10, 12, 0)).unwrap();
        assert_eq!(resolved.value, utc(2024, 5, 11, 9, 0));

        let even = time_of_day(9, 0).with_filter(DayFilter {
            parity: DayParity::Even,
            ..Default::default()
        });
        let resolved = r.resolve(&even, utc(2024, 5, 10, 12, 0)).unwrap();
        assert_eq!(resolved.value, utc(2024, 5, 12, 9, 0));

        let december = time_of_day(9, 0).with_filter(DayFilter {
            months: vec![12],
            ..Default::default()
        });
        let resolved = r.resolve(&december, utc(2024, 5, 10, 12, 0)).unwrap();
        assert_eq!(resolved.value, utc(2024, 12, 1, 9, 0));
    }

    #[test]
    fn test_unsatisfiable_filter_is_an_error() {
        let r = resolver(52.52, 13.405, DayBoundary::Utc);
        // There is no thirteenth month
        let never = time_of_day(9, 0).with_filter(DayFilter {
            months: vec![13],
            ..Default::default()
        });
        assert!(matches!(
            r.resolve(&never, utc(2024, 5, 10, 12, 0)),
            Err(Error::UnresolvableTime(_))
        ));
    }

    #[test]
    fn test_absolute_instant() {
        let r = resolver(52.52, 13.405, DayBoundary::Utc);
        let spec = TimeSpec::new(TimeKind::Absolute(utc(2024, 12, 24, 18, 0)));

        let resolved = r.resolve(&spec, utc(2024, 12, 1, 0, 0)).unwrap();
        assert_eq!(resolved.value, utc(2024, 12, 24, 18, 0));
        assert!(resolved.is_fixed);
        assert!(r.resolve(&spec, utc(2024, 12, 25, 0, 0)).is_err());
    }
}
