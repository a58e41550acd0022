use super::validation::validate_config;
use super::*;
use chrono::{NaiveTime, TimeZone, Utc};
use proptest::prelude::*;
use serial_test::serial;
use std::fs;
use tempfile::tempdir;

const FULL_CONFIG: &str = r#"
[location]
latitude = 52.52
longitude = 13.405
day_boundary = "Europe/Berlin"
legacy_names = false
height = 30.0

[logging]
debug = true

[[node]]
name = "porch-light"
once = true
date_range = { start = "11-02", end = "03-20" }

[node.schedule]
type = "window"
start = { sun = "sunset", offset = -15, unit = "m" }
end = { time = "23:30" }
interval = { value = 10, unit = "m" }

[[node]]
name = "heartbeat"

[node.schedule]
type = "periodic"
interval = { value = 1.5, unit = "h" }

[[node]]
name = "weekend-moon"

[node.schedule]
type = "at"
time = { moon = "rise", weekdays = ["sat", "sun"], days = "even" }
"#;

fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("suntimer.toml");
    fs::write(&path, content).unwrap();
    (temp_dir, path)
}

fn minimal(nodes: &str) -> Config {
    let content = format!("[location]\nlatitude = 52.0\nlongitude = 13.0\n{nodes}");
    toml::from_str(&content).unwrap()
}

fn periodic_node(name: &str, value: f64, unit: &str) -> String {
    format!(
        "[[node]]\nname = \"{name}\"\n[node.schedule]\ntype = \"periodic\"\ninterval = {{ value = {value}, unit = \"{unit}\" }}\n"
    )
}

#[test]
fn test_full_config_parses_into_schedules() {
    let (_dir, path) = write_config(FULL_CONFIG);
    let config = load_from_path(&path).unwrap();

    assert!(config.debug());
    assert_eq!(
        config.day_boundary().unwrap(),
        DayBoundary::Zone(chrono_tz::Europe::Berlin)
    );
    let options = config.sun_options();
    assert_eq!(options.height_m, 30.0);
    assert!(!options.legacy_names);

    let schedules = config.node_schedules().unwrap();
    let names: Vec<_> = schedules.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["porch-light", "heartbeat", "weekend-moon"]);

    let (_, porch) = &schedules[0];
    assert_eq!(porch.once_delay_ms, Some(DEFAULT_ONCE_DELAY_MS));
    assert_eq!(porch.date_range.unwrap().to_string(), "11-02 to 03-20");
    let ScheduleSpec::Window {
        start,
        end,
        interval,
    } = &porch.schedule
    else {
        panic!("expected a window schedule");
    };
    assert_eq!(start.kind, TimeKind::Sun(SunEvent::SunsetEnd));
    assert_eq!(start.offset_ms(), -15 * 60_000);
    assert_eq!(
        end.kind,
        TimeKind::TimeOfDay(NaiveTime::from_hms_opt(23, 30, 0).unwrap())
    );
    assert_eq!(interval.period_ms(), 600_000);

    let (_, heartbeat) = &schedules[1];
    assert_eq!(heartbeat.once_delay_ms, None);
    assert_eq!(
        heartbeat.schedule.interval().map(IntervalSpec::period_ms),
        Some(5_400_000)
    );

    let (_, moon) = &schedules[2];
    let spec = moon.schedule.start_spec().unwrap();
    assert_eq!(spec.kind, TimeKind::Moon(MoonEvent::Rise));
    assert_eq!(spec.filter.parity, DayParity::Even);
    assert_eq!(spec.filter.weekdays, [Weekday::Sat, Weekday::Sun]);
}

#[test]
fn test_absolute_time_is_read_in_boundary_zone() {
    let config = minimal(
        "[[node]]\nname = \"launch\"\n[node.schedule]\ntype = \"at\"\ntime = { at = \"2030-07-01 12:00:00\" }\n",
    );
    let berlin = DayBoundary::Zone(chrono_tz::Europe::Berlin);
    let schedule = config.nodes[0].schedule_config(&berlin).unwrap();
    assert_eq!(
        schedule.schedule.start_spec().unwrap().kind,
        TimeKind::Absolute(Utc.with_ymd_and_hms(2030, 7, 1, 10, 0, 0).unwrap())
    );
}

#[test]
fn test_once_delay_is_configurable() {
    let mut config = minimal(&periodic_node("a", 5.0, "m"));
    config.nodes[0].once = Some(true);
    config.nodes[0].once_delay_ms = Some(0);
    let schedule = config.nodes[0].schedule_config(&DayBoundary::Utc).unwrap();
    assert_eq!(schedule.once_delay_ms, Some(0));

    // once_delay_ms alone does not enable the emission
    config.nodes[0].once = None;
    let schedule = config.nodes[0].schedule_config(&DayBoundary::Utc).unwrap();
    assert_eq!(schedule.once_delay_ms, None);
}

#[test]
fn test_validation_rejects_bad_coordinates() {
    let mut config = minimal("");
    config.location.latitude = Some(91.0);
    assert!(validate_config(&config).is_err());

    config.location.latitude = Some(f64::NAN);
    assert!(validate_config(&config).is_err());

    config.location.latitude = Some(45.0);
    config.location.longitude = Some(-180.5);
    assert!(validate_config(&config).is_err());
}

#[test]
fn test_validation_requires_location_for_nodes() {
    let mut config = minimal(&periodic_node("a", 5.0, "m"));
    config.location.longitude = None;
    let err = validate_config(&config).unwrap_err();
    assert!(format!("{err:#}").contains("location.longitude"));

    // Without nodes, a missing location is fine
    config.nodes.clear();
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_validation_rejects_bad_intervals() {
    assert!(validate_config(&minimal(&periodic_node("a", 0.0, "m"))).is_err());
    assert!(validate_config(&minimal(&periodic_node("a", -1.0, "s"))).is_err());
    assert!(validate_config(&minimal(&periodic_node("a", 0.1, "ms"))).is_err());
    assert!(validate_config(&minimal(&periodic_node("a", 30.0, "d"))).is_err());
    assert!(validate_config(&minimal(&periodic_node("a", 5.0, "fortnights"))).is_err());
    assert!(validate_config(&minimal(&periodic_node("a", 24.0, "d"))).is_ok());
}

#[test]
fn test_validation_rejects_duplicate_names() {
    let nodes = format!(
        "{}{}",
        periodic_node("same", 5.0, "m"),
        periodic_node("same", 10.0, "m")
    );
    let err = validate_config(&minimal(&nodes)).unwrap_err();
    assert!(err.to_string().contains("duplicate node name 'same'"));
}

#[test]
fn test_validation_rejects_bad_time_references() {
    let at = |time: &str| {
        minimal(&format!(
            "[[node]]\nname = \"n\"\n[node.schedule]\ntype = \"at\"\ntime = {time}\n"
        ))
    };
    assert!(validate_config(&at(r#"{ sun = "dusk" }"#)).is_ok());
    assert!(validate_config(&at(r#"{ sun = "highNoon" }"#)).is_err());
    assert!(validate_config(&at(r#"{ moon = "full" }"#)).is_err());
    assert!(validate_config(&at(r#"{ time = "25:00" }"#)).is_err());
    assert!(validate_config(&at(r#"{ sun = "dusk", time = "20:00" }"#)).is_err());
    assert!(validate_config(&at(r#"{ offset = 5 }"#)).is_err());
    assert!(validate_config(&at(r#"{ time = "08:00", months = [0] }"#)).is_err());
    assert!(validate_config(&at(r#"{ time = "08:00", weekdays = ["someday"] }"#)).is_err());
    assert!(validate_config(&at(r#"{ time = "08:00", days = "prime" }"#)).is_err());
}

#[test]
fn test_validation_rejects_bad_date_range() {
    let mut config = minimal(&periodic_node("a", 5.0, "m"));
    config.nodes[0].date_range = Some(DateRangeConfig {
        start: "13-01".into(),
        end: "03-20".into(),
    });
    assert!(validate_config(&config).is_err());

    config.nodes[0].date_range = Some(DateRangeConfig {
        start: "02-29".into(),
        end: "03-20".into(),
    });
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_validation_rejects_unknown_zone() {
    let mut config = minimal("");
    config.location.day_boundary = Some("Mars/Olympus_Mons".into());
    assert!(validate_config(&config).is_err());
    config.location.day_boundary = Some("UTC".into());
    assert!(validate_config(&config).is_ok());
}

#[test]
fn test_config_malformed_toml() {
    let (_dir, path) = write_config("[location\nlatitude = ");
    assert!(load_from_path(&path).is_err());

    let (_dir, path) = write_config("[location]\nlattitude = 52.0\n");
    assert!(load_from_path(&path).is_err());
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let temp_dir = tempdir().unwrap();
    assert!(load_from_path(&temp_dir.path().join("nope.toml")).is_err());
}

#[test]
fn test_geo_toml_overrides_main_config() {
    let (dir, path) = write_config("[location]\nlatitude = 10.0\nlongitude = 10.0\n");
    fs::write(
        dir.path().join("geo.toml"),
        "latitude = -33.8688\nlongitude = 151.2093\n",
    )
    .unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.location.latitude, Some(-33.8688));
    assert_eq!(config.location.longitude, Some(151.2093));
}

#[test]
fn test_malformed_geo_toml_fallback() {
    let (dir, path) = write_config("[location]\nlatitude = 10.0\nlongitude = 20.0\n");
    fs::write(dir.path().join("geo.toml"), "latitude = \"north\"").unwrap();

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.location.latitude, Some(10.0));
    assert_eq!(config.location.longitude, Some(20.0));
}

#[test]
fn test_geo_toml_values_are_validated() {
    let (dir, path) = write_config("[location]\nlatitude = 10.0\nlongitude = 20.0\n");
    fs::write(dir.path().join("geo.toml"), "latitude = 123.0\n").unwrap();
    assert!(load_from_path(&path).is_err());
}

#[test]
fn test_default_config_file_creation() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("nested").join("suntimer.toml");

    create_default_config(&path, Some((48.8566, 2.3522))).unwrap();
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("[location]"));
    assert!(content.contains("# [[node]]"));

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.location.latitude, Some(48.8566));
    assert_eq!(config.location.longitude, Some(2.3522));
    assert_eq!(config.day_boundary().unwrap(), DayBoundary::Utc);
    assert!(config.nodes.is_empty());
}

#[test]
fn test_default_config_writes_coordinates_to_existing_geo_toml() {
    let temp_dir = tempdir().unwrap();
    let path = temp_dir.path().join("suntimer.toml");
    let geo_path = temp_dir.path().join("geo.toml");
    fs::write(&geo_path, "").unwrap();

    create_default_config(&path, None).unwrap();
    assert!(!fs::read_to_string(&path).unwrap().contains("latitude"));
    assert!(fs::read_to_string(&geo_path).unwrap().contains("latitude = 52.52"));

    let config = load_from_path(&path).unwrap();
    assert_eq!(config.location.latitude, Some(DEFAULT_LATITUDE));
    assert_eq!(config.location.longitude, Some(DEFAULT_LONGITUDE));
}

#[test]
#[serial]
fn test_config_load_default_creation() {
    let temp_dir = tempdir().unwrap();
    let config_path = temp_dir.path().join("suntimer").join("suntimer.toml");

    // Save and restore XDG_CONFIG_HOME
    let original = std::env::var("XDG_CONFIG_HOME").ok();
    unsafe {
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());
    }

    let result = Config::load();

    unsafe {
        match original {
            Some(val) => std::env::set_var("XDG_CONFIG_HOME", val),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    let config = result.unwrap();
    assert!(config_path.exists());
    assert_eq!(config.coordinate().unwrap().latitude(), DEFAULT_LATITUDE);
}

proptest! {
    #[test]
    fn test_coordinate_ranges(lat in -120.0f64..120.0, lon in -200.0f64..200.0) {
        let mut config = minimal("");
        config.location.latitude = Some(lat);
        config.location.longitude = Some(lon);
        let valid = (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon);
        prop_assert_eq!(validate_config(&config).is_ok(), valid);
        prop_assert_eq!(config.coordinate().is_ok(), valid);
    }

    #[test]
    fn test_interval_bounds(value in 1u64..=40, unit in prop::sample::select(vec!["h", "d"])) {
        let config = minimal(&periodic_node("n", value as f64, unit));
        let period = value * if unit == "h" { 3_600_000 } else { 86_400_000 };
        prop_assert_eq!(validate_config(&config).is_ok(), period <= MAX_TIMEOUT_MS);
    }
}
