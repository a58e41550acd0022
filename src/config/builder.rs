//! Default configuration file creation.
//!
//! Builds a commented, column-aligned `suntimer.toml`. When a `geo.toml`
//! already sits in the target directory the coordinates go there instead of
//! the main file.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::loading::geo_path_for;
use crate::common::constants::*;

/// Write a default configuration file.
///
/// # Arguments
/// * `path` - Where the config file should be created
/// * `coords` - Optional `(latitude, longitude)`; the built-in default location otherwise
pub fn create_default_config(path: &Path, coords: Option<(f64, f64)>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let (lat, lon) = coords.unwrap_or((DEFAULT_LATITUDE, DEFAULT_LONGITUDE));

    let geo_path = geo_path_for(path).filter(|geo| geo.exists());
    let coords_in_main = match &geo_path {
        Some(geo_path) => {
            let geo_content =
                format!("#[Private geo coordinates]\nlatitude = {lat:.6}\nlongitude = {lon:.6}\n");
            fs::write(geo_path, geo_content).with_context(|| {
                format!("Failed to write coordinates to {}", geo_path.display())
            })?;
            log_indented!(
                "Saved coordinates to separate geo file: {}",
                geo_path.display()
            );
            false
        }
        None => true,
    };

    let mut builder = ConfigBuilder::new().add_table("location");
    if coords_in_main {
        builder = builder
            .add_setting("latitude", &format!("{lat:.6}"), "Geographic latitude (-90 to 90)")
            .add_setting(
                "longitude",
                &format!("{lon:.6}"),
                "Geographic longitude (-180 to 180)",
            );
    }
    let content = builder
        .add_setting(
            "day_boundary",
            "\"utc\"",
            "Calendar for daily times: \"utc\" or an IANA zone like \"Europe/Berlin\"",
        )
        .add_setting("legacy_names", "true", "Include alias names in sun tables")
        .add_setting("height", "0.0", "Observer height above the horizon in metres")
        .add_table("logging")
        .add_setting("debug", "false", "Log schedule computations")
        .add_comment("Nodes: uncomment and adapt")
        .add_comment("[[node]]")
        .add_comment("name = \"porch-light\"")
        .add_comment("once = false")
        .add_comment("[node.schedule]")
        .add_comment("type = \"window\"")
        .add_comment("start = { sun = \"sunset\", offset = -15, unit = \"m\" }")
        .add_comment("end = { time = \"23:30\" }")
        .add_comment("interval = { value = 10, unit = \"m\" }")
        .build();

    fs::write(path, content)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;
    log_block_start!("Created default configuration at {}", path.display());
    Ok(())
}

struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Table(String),
    Setting { line: String, comment: String },
    Comment(String),
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_table(mut self, name: &str) -> Self {
        self.entries.push(ConfigEntry::Table(format!("[{name}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn add_comment(mut self, text: &str) -> Self {
        self.entries.push(ConfigEntry::Comment(format!("# {text}")));
        self
    }

    fn build(self) -> String {
        // Align every comment one space past the longest setting
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        let mut previous_was_setting = false;

        for entry in self.entries {
            match entry {
                ConfigEntry::Table(header) => {
                    if !result.is_empty() {
                        result.push(String::new());
                    }
                    result.push(header);
                    previous_was_setting = false;
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                    previous_was_setting = true;
                }
                ConfigEntry::Comment(text) => {
                    if previous_was_setting {
                        result.push(String::new());
                    }
                    result.push(text);
                    previous_was_setting = false;
                }
            }
        }

        result.push(String::new());
        result.join("\n")
    }
}
