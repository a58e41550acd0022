//! Command-line command handlers for suntimer.
//!
//! Each command lives in its own submodule. They share configuration loading
//! and the `--date` parsing defined here.

pub mod moon;
pub mod run;
pub mod simulate;
pub mod times;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::path::PathBuf;

use crate::args::CommonOptions;
use crate::astro::DayBoundary;
use crate::config::{self, Config};
use crate::logger::Log;

/// Apply the global flags and load the configuration they point to.
pub fn load_config(options: &CommonOptions) -> Result<Config> {
    if let Some(path) = &options.config_path {
        config::set_config_path(PathBuf::from(path))?;
    }
    let config = Config::load()?;
    Log::set_debug(options.debug_enabled || config.debug());
    Ok(config)
}

/// Instant a `--date` refers to: midnight of that day under `boundary`, or
/// now when absent.
pub fn resolve_date(
    date: Option<&str>,
    boundary: &DayBoundary,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    match date {
        None => Ok(now),
        Some(s) => {
            let day = NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date '{s}'. Use YYYY-MM-DD"))?;
            Ok(boundary.at(day, NaiveTime::MIN))
        }
    }
}

/// Format an instant in the boundary's zone for display.
pub(crate) fn display_time(instant: DateTime<Utc>, boundary: &DayBoundary) -> String {
    match boundary {
        DayBoundary::Utc => instant.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        DayBoundary::Zone(tz) => instant
            .with_timezone(tz)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
    }
}
