//! Configuration system for suntimer.
//!
//! Handles the TOML configuration file: locating it, generating a default one,
//! validating it, and turning its node sections into schedule configurations.
//!
//! ## Configuration Sources
//!
//! 1. An explicit path passed with `--config`
//! 2. **XDG_CONFIG_HOME**/suntimer/suntimer.toml (created with defaults when missing)
//!
//! A `geo.toml` next to the main file overrides `latitude`/`longitude`, so the
//! main file can be shared without revealing the location.
//!
//! ## Configuration Structure
//!
//! ```toml
//! [location]
//! latitude = 52.52              # Geographic latitude (-90 to 90)
//! longitude = 13.405            # Geographic longitude (-180 to 180)
//! day_boundary = "utc"          # "utc" or an IANA zone such as "Europe/Berlin"
//! legacy_names = true           # Include alias names in sun tables
//! height = 0.0                  # Observer height in metres
//!
//! [logging]
//! debug = false
//!
//! [[node]]
//! name = "porch-light"
//! once = true                   # Emit once shortly after start
//! once_delay_ms = 100
//! date_range = { start = "11-02", end = "03-20" }
//!
//! [node.schedule]
//! type = "window"               # "periodic", "at" or "window"
//! start = { sun = "sunset", offset = -15, unit = "m" }
//! end = { time = "23:30" }
//! interval = { value = 10, unit = "m" }
//! ```
//!
//! A time reference names exactly one of `sun`, `moon` (`"rise"`/`"set"`),
//! `time` (`HH:MM[:SS]` wall clock) or `at` (`YYYY-MM-DD HH:MM:SS`), plus an
//! optional `offset`/`unit` and day filters (`days = "odd"|"even"`,
//! `weekdays = ["sat", "sun"]`, `months = [12, 1]`).

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::{Context, Result};
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::astro::sun::SunTimesOptions;
use crate::astro::{DayBoundary, GeoCoordinate, SunEvent};
use crate::common::constants::*;
use crate::error::Error;
use crate::schedule::{
    DateRange, DayFilter, DayParity, IntervalSpec, MonthDay, MoonEvent, ScheduleConfig,
    ScheduleSpec, TimeKind, TimeSpec, TimeUnit,
};

pub use builder::create_default_config;
pub use loading::{get_config_path, load, load_from_path, set_config_path};

/// Optional `geo.toml` holding only the coordinates.
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct GeoConfig {
    pub(crate) latitude: Option<f64>,
    pub(crate) longitude: Option<f64>,
}

/// Top-level configuration file.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default, rename = "node")]
    pub nodes: Vec<NodeConfig>,
}

/// `[location]` section.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// `"utc"` or an IANA zone name.
    pub day_boundary: Option<String>,
    pub legacy_names: Option<bool>,
    /// Observer height in metres.
    pub height: Option<f64>,
}

/// `[logging]` section.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub debug: Option<bool>,
}

/// One `[[node]]` entry.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub name: String,
    pub once: Option<bool>,
    pub once_delay_ms: Option<u64>,
    pub schedule: ScheduleSection,
    pub date_range: Option<DateRangeConfig>,
}

/// `[node.schedule]`, tagged by `type`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ScheduleSection {
    Periodic {
        interval: IntervalConfig,
    },
    At {
        time: TimeConfig,
    },
    Window {
        start: TimeConfig,
        end: TimeConfig,
        interval: IntervalConfig,
    },
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IntervalConfig {
    pub value: f64,
    /// Defaults to minutes.
    pub unit: Option<String>,
}

/// A time reference with offset and day filters.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct TimeConfig {
    pub sun: Option<String>,
    pub moon: Option<String>,
    pub time: Option<String>,
    pub at: Option<String>,
    pub offset: Option<f64>,
    /// Offset unit, defaults to minutes.
    pub unit: Option<String>,
    pub days: Option<String>,
    pub weekdays: Option<Vec<String>>,
    pub months: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DateRangeConfig {
    pub start: String,
    pub end: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        load()
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        load_from_path(path)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        get_config_path()
    }

    /// Observer coordinate. Both values must be configured.
    pub fn coordinate(&self) -> Result<GeoCoordinate> {
        let latitude = self
            .location
            .latitude
            .ok_or(Error::ConfigurationMissing("location.latitude"))?;
        let longitude = self
            .location
            .longitude
            .ok_or(Error::ConfigurationMissing("location.longitude"))?;
        Ok(GeoCoordinate::new(latitude, longitude)?)
    }

    pub fn day_boundary(&self) -> Result<DayBoundary> {
        match self.location.day_boundary.as_deref() {
            None => Ok(DayBoundary::Utc),
            Some(s) => s.parse().map_err(anyhow::Error::msg),
        }
    }

    pub fn sun_options(&self) -> SunTimesOptions {
        SunTimesOptions {
            height_m: self.location.height.unwrap_or(0.0),
            legacy_names: self.location.legacy_names.unwrap_or(true),
        }
    }

    pub fn debug(&self) -> bool {
        self.logging.debug.unwrap_or(false)
    }

    /// Schedules of every node, in file order.
    pub fn node_schedules(&self) -> Result<Vec<(String, ScheduleConfig)>> {
        let boundary = self.day_boundary()?;
        self.nodes
            .iter()
            .map(|node| {
                let config = node
                    .schedule_config(&boundary)
                    .with_context(|| format!("Invalid schedule for node '{}'", node.name))?;
                Ok((node.name.clone(), config))
            })
            .collect()
    }

    pub fn log_config(&self) {
        log_block_start!("Loaded configuration");
        if let (Some(lat), Some(lon)) = (self.location.latitude, self.location.longitude) {
            let lat_dir = if lat >= 0.0 { "N" } else { "S" };
            let lon_dir = if lon >= 0.0 { "E" } else { "W" };
            log_indented!(
                "Location: {:.3}°{}, {:.3}°{}",
                lat.abs(),
                lat_dir,
                lon.abs(),
                lon_dir
            );
        }
        log_indented!(
            "Day boundary: {}",
            self.location.day_boundary.as_deref().unwrap_or("utc")
        );
        if let Some(height) = self.location.height
            && height > 0.0
        {
            log_indented!("Observer height: {height} m");
        }
        match self.nodes.len() {
            0 => log_indented!("No nodes configured"),
            1 => log_indented!("1 node: {}", self.nodes[0].name),
            n => log_indented!(
                "{} nodes: {}",
                n,
                self.nodes
                    .iter()
                    .map(|node| node.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

impl NodeConfig {
    /// Build the engine configuration of this node.
    pub fn schedule_config(&self, boundary: &DayBoundary) -> Result<ScheduleConfig> {
        let schedule = match &self.schedule {
            ScheduleSection::Periodic { interval } => ScheduleSpec::Periodic(interval.spec()?),
            ScheduleSection::At { time } => ScheduleSpec::At(time.spec(boundary)?),
            ScheduleSection::Window {
                start,
                end,
                interval,
            } => ScheduleSpec::Window {
                start: start.spec(boundary).context("Invalid window start")?,
                end: end.spec(boundary).context("Invalid window end")?,
                interval: interval.spec()?,
            },
        };

        let mut config = ScheduleConfig::new(schedule);
        if self.once.unwrap_or(false) {
            config.once_delay_ms = Some(self.once_delay_ms.unwrap_or(DEFAULT_ONCE_DELAY_MS));
        }
        if let Some(range) = &self.date_range {
            config.date_range = Some(range.range()?);
        }
        Ok(config)
    }
}

impl IntervalConfig {
    pub fn spec(&self) -> Result<IntervalSpec> {
        Ok(IntervalSpec::new(self.value, parse_unit(self.unit.as_deref())?))
    }
}

impl TimeConfig {
    /// Build a time reference; absolute instants are read in the boundary's zone.
    pub fn spec(&self, boundary: &DayBoundary) -> Result<TimeSpec> {
        let kind = match (&self.sun, &self.moon, &self.time, &self.at) {
            (Some(sun), None, None, None) => {
                TimeKind::Sun(sun.parse::<SunEvent>().map_err(anyhow::Error::msg)?)
            }
            (None, Some(moon), None, None) => TimeKind::Moon(parse_moon_event(moon)?),
            (None, None, Some(time), None) => TimeKind::TimeOfDay(parse_time_of_day(time)?),
            (None, None, None, Some(at)) => {
                TimeKind::Absolute(boundary.parse_datetime(at).map_err(anyhow::Error::msg)?)
            }
            (None, None, None, None) => {
                anyhow::bail!("time reference needs one of 'sun', 'moon', 'time' or 'at'")
            }
            _ => anyhow::bail!("time reference must name only one of 'sun', 'moon', 'time' or 'at'"),
        };

        let filter = DayFilter {
            parity: match self.days.as_deref() {
                None | Some("any") => DayParity::Any,
                Some("odd") => DayParity::Odd,
                Some("even") => DayParity::Even,
                Some(other) => anyhow::bail!("days must be \"odd\" or \"even\" (got \"{other}\")"),
            },
            weekdays: self
                .weekdays
                .iter()
                .flatten()
                .map(|day| {
                    day.parse::<Weekday>()
                        .map_err(|_| anyhow::anyhow!("unknown weekday '{day}'"))
                })
                .collect::<Result<_>>()?,
            months: self.months.clone().unwrap_or_default(),
        };

        Ok(TimeSpec::new(kind)
            .with_offset(self.offset.unwrap_or(0.0), parse_unit(self.unit.as_deref())?)
            .with_filter(filter))
    }
}

impl DateRangeConfig {
    pub fn range(&self) -> Result<DateRange> {
        let start: MonthDay = self.start.parse().map_err(anyhow::Error::msg)?;
        let end: MonthDay = self.end.parse().map_err(anyhow::Error::msg)?;
        Ok(DateRange::new(start, end))
    }
}

fn parse_unit(unit: Option<&str>) -> Result<TimeUnit> {
    match unit {
        None => Ok(TimeUnit::Minutes),
        Some(s) => s.parse().map_err(anyhow::Error::msg),
    }
}

fn parse_moon_event(s: &str) -> Result<MoonEvent> {
    match s.to_ascii_lowercase().as_str() {
        "rise" | "moonrise" => Ok(MoonEvent::Rise),
        "set" | "moonset" => Ok(MoonEvent::Set),
        _ => anyhow::bail!("moon event must be \"rise\" or \"set\" (got \"{s}\")"),
    }
}

fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .with_context(|| format!("Invalid time '{s}'. Use HH:MM or HH:MM:SS"))
}

#[cfg(test)]
mod tests;
