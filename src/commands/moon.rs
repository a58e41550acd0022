//! `suntimer moon`: print moon rise/set, position and illumination.

use anyhow::Result;
use serde_json::json;

use super::{display_time, resolve_date};
use crate::astro::moon::{compute_moon_times, moon_illumination, moon_position};
use crate::astro::{DayBoundary, MoonTimes};
use crate::config::Config;

pub fn run_moon_command(config: &Config, date: Option<&str>, json: bool) -> Result<()> {
    let coord = config.coordinate()?;
    let boundary = config.day_boundary()?;
    let now = crate::time::source::now();
    let instant = resolve_date(date, &boundary, now)?;

    let times = compute_moon_times(instant, &coord, &boundary);
    let position = moon_position(now, &coord);
    let illumination = moon_illumination(instant);

    if json {
        let output = json!({
            "date": boundary.date_of(instant),
            "latitude": coord.latitude(),
            "longitude": coord.longitude(),
            "times": times,
            "position": position,
            "illumination": illumination,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    log_block_start!("Moon on {} at {}", boundary.date_of(instant), coord);
    for line in rise_set_lines(&times, &boundary) {
        log_indented!("{}", line);
    }
    log_indented!(
        "Phase: {} ({:.1}% illuminated)",
        illumination.phase_name,
        illumination.fraction * 100.0
    );
    log_block_start!("Moon position now ({})", display_time(now, &boundary));
    // Radians from south, shown as a compass bearing
    log_indented!(
        "Azimuth: {:.2}°",
        (position.azimuth.to_degrees() + 180.0).rem_euclid(360.0)
    );
    log_indented!("Altitude: {:.2}°", position.altitude.to_degrees());
    log_indented!("Distance: {:.0} km", position.distance);
    log_end!();
    Ok(())
}

pub(crate) fn rise_set_lines(times: &MoonTimes, boundary: &DayBoundary) -> Vec<String> {
    if times.always_up {
        return vec!["Above the horizon all day".to_string()];
    }
    if times.always_down {
        return vec!["Below the horizon all day".to_string()];
    }
    let show = |instant: Option<_>| match instant {
        Some(instant) => display_time(instant, boundary),
        None => "none on this day".to_string(),
    };
    vec![
        format!("Rise: {}", show(times.rise)),
        format!("Set:  {}", show(times.set)),
    ]
}
