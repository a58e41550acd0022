use chrono::{DateTime, Duration, NaiveTime, Utc};
use proptest::prelude::*;
use std::fs;
use std::sync::Arc;
use suntimer::astro::{AstroCache, DayBoundary, GeoCoordinate, SunEvent};
use suntimer::commands::run::build_runtime;
use suntimer::config::Config;
use suntimer::logger::Log;
use suntimer::schedule::{AstroResolver, TimeKind, TimeResolver, TimeSpec};
use suntimer::time::SimulatedTimeSource;
use tempfile::tempdir;

/// 2000-01-01 .. 2050-01-01
fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (946_684_800i64..2_524_608_000).prop_map(|secs| DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs))
}

fn resolver(lat: f64, lon: f64, boundary: DayBoundary) -> AstroResolver {
    AstroResolver::new(
        GeoCoordinate::new(lat, lon).unwrap(),
        boundary,
        Arc::new(AstroCache::default()),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Outside the polar circles a sunset is always within about a day.
    #[test]
    fn test_sunset_resolves_within_two_days(
        lat in -60.0f64..=60.0,
        lon in -180.0f64..=180.0,
        now in instant_strategy(),
    ) {
        let r = resolver(lat, lon, DayBoundary::Utc);
        let spec = TimeSpec::new(TimeKind::Sun(SunEvent::SunsetEnd));
        let resolved = r.resolve(&spec, now).unwrap();

        prop_assert!(resolved.value > now);
        prop_assert!(resolved.value - now <= Duration::days(2));
        prop_assert!(!resolved.is_fixed);
    }

    /// A wall-clock time comes back within the next 24 hours.
    #[test]
    fn test_time_of_day_resolves_within_a_day(
        hour in 0u32..24,
        minute in 0u32..60,
        now in instant_strategy(),
    ) {
        let r = resolver(52.52, 13.405, DayBoundary::Utc);
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        let resolved = r.resolve(&TimeSpec::new(TimeKind::TimeOfDay(time)), now).unwrap();

        prop_assert!(resolved.value > now);
        prop_assert!(resolved.value - now <= Duration::days(1));
        prop_assert_eq!(resolved.value.time(), time);
    }
}

#[test]
fn test_config_file_to_runtime() {
    Log::set_enabled(false);
    let dir = tempdir().unwrap();
    let path = dir.path().join("suntimer.toml");
    fs::write(
        &path,
        r#"
[location]
latitude = 48.137
longitude = 11.575
day_boundary = "Europe/Berlin"

[[node]]
name = "dusk"
[node.schedule]
type = "at"
time = { sun = "dusk" }

[[node]]
name = "poll"
[node.schedule]
type = "periodic"
interval = { value = 2, unit = "s" }
"#,
    )
    .unwrap();

    let config = Config::load_from_path(&path).unwrap();
    let start = DateTime::parse_from_rfc3339("2024-10-01T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    let source = Arc::new(SimulatedTimeSource::fast_forward(
        start,
        start + Duration::seconds(10),
    ));
    let mut runtime = build_runtime(&config, source, true).unwrap();
    assert!(runtime.node("dusk").is_some());
    assert!(runtime.node("poll").is_some());

    runtime.start();
    // Five ticks of "poll"; dusk is hours away
    assert_eq!(runtime.run_until(start + Duration::seconds(10)), 5);
    runtime.shutdown();
    assert_eq!(runtime.live_timers(), 0);
}
