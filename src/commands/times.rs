//! `suntimer times`: print the sun time table for a day.

use anyhow::Result;
use serde_json::json;

use super::{display_time, resolve_date};
use crate::astro::sun::{compute_sun_times_with, sun_position};
use crate::astro::{DayBoundary, SunTimes};
use crate::config::Config;

pub fn run_times_command(config: &Config, date: Option<&str>, json: bool) -> Result<()> {
    let coord = config.coordinate()?;
    let boundary = config.day_boundary()?;
    let now = crate::time::source::now();
    let instant = resolve_date(date, &boundary, now)?;
    let table = compute_sun_times_with(instant, &coord, &boundary, &config.sun_options());
    let position = sun_position(now, &coord);

    if json {
        let times: serde_json::Map<_, _> = table
            .entries()
            .into_iter()
            .map(|(name, event)| Ok((name.to_string(), serde_json::to_value(event)?)))
            .collect::<Result<_>>()?;
        let output = json!({
            "date": table.date,
            "latitude": coord.latitude(),
            "longitude": coord.longitude(),
            "day_boundary": boundary.to_string(),
            "times": times,
            "position": position,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    log_block_start!("Sun times for {} at {}", table.date, coord);
    for line in table_lines(&table, &boundary) {
        log_indented!("{}", line);
    }
    log_block_start!("Sun position now ({})", display_time(now, &boundary));
    log_indented!("Azimuth: {:.2}°", position.azimuth_degrees);
    log_indented!("Altitude: {:.2}°", position.altitude_degrees);
    log_end!();
    Ok(())
}

/// One aligned line per table entry, in table order.
pub(crate) fn table_lines(table: &SunTimes, boundary: &DayBoundary) -> Vec<String> {
    let width = table
        .entries()
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    table
        .entries()
        .into_iter()
        .map(|(name, event)| {
            let marker = if event.valid { "" } else { "  (not reached)" };
            format!(
                "{name:<width$}  {}{marker}",
                display_time(event.value, boundary)
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::GeoCoordinate;
    use crate::astro::sun::compute_sun_times;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_table_lines_mark_unreached_events() {
        let coord = GeoCoordinate::new(78.2, 15.6).unwrap();
        let midsummer = Utc.with_ymd_and_hms(2024, 6, 21, 12, 0, 0).unwrap();
        let table = compute_sun_times(midsummer, &coord, &DayBoundary::Utc);

        let lines = table_lines(&table, &DayBoundary::Utc);
        assert_eq!(lines.len(), table.entries().len());
        let sunset = lines
            .iter()
            .find(|line| line.starts_with("sunsetEnd "))
            .unwrap();
        assert!(sunset.ends_with("(not reached)"));
        let noon = lines
            .iter()
            .find(|line| line.starts_with("solarNoon "))
            .unwrap();
        assert!(!noon.contains("not reached"));
    }
}
