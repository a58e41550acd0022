//! Configuration loading functionality.
//!
//! Handles locating the configuration file, creating a default one on first
//! use, and applying `geo.toml` coordinate overrides before validation.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::validation::validate_config;
use super::{Config, GeoConfig};
use crate::common::constants::*;

/// Explicit configuration file, set once at startup
static CONFIG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Use an explicit configuration file for the rest of the process.
/// Returns an error if already set.
pub fn set_config_path(path: PathBuf) -> Result<()> {
    CONFIG_PATH
        .set(path)
        .map_err(|_| anyhow::anyhow!("Configuration path already set"))
}

/// Path of the configuration file: the explicit one if set, otherwise
/// `$XDG_CONFIG_HOME/suntimer/suntimer.toml`.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(path) = CONFIG_PATH.get() {
        return Ok(path.clone());
    }
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration from the resolved path.
///
/// A default configuration is written first when the default location has no
/// file yet. An explicit path that does not exist is an error.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        if CONFIG_PATH.get().is_some() {
            anyhow::bail!(
                "Configuration file not found at specified path: {}",
                config_path.display()
            );
        }
        super::builder::create_default_config(&config_path, None)
            .context("Failed to create default config during load")?;
    }

    load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}

/// Load configuration from a specific path without creating anything.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found: {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    // geo.toml values are validated together with the rest
    load_geo_override_from_path(&mut config, path)?;

    validate_config(&config)?;

    Ok(config)
}

/// Path of the `geo.toml` next to a configuration file.
pub fn geo_path_for(config_path: &Path) -> Option<PathBuf> {
    config_path.parent().map(|parent| parent.join("geo.toml"))
}

/// Apply coordinates from `geo.toml` if one sits next to the config file.
pub(crate) fn load_geo_override_from_path(config: &mut Config, config_path: &Path) -> Result<()> {
    let Some(geo_path) = geo_path_for(config_path) else {
        return Ok(());
    };

    if !geo_path.exists() {
        return Ok(());
    }

    match fs::read_to_string(&geo_path) {
        Ok(content) => match toml::from_str::<GeoConfig>(&content) {
            Ok(geo_config) => {
                if let Some(lat) = geo_config.latitude {
                    config.location.latitude = Some(lat);
                }
                if let Some(lon) = geo_config.longitude {
                    config.location.longitude = Some(lon);
                }
                log_debug!("Coordinates loaded from {}", geo_path.display());
            }
            Err(e) => {
                log_warning!("Failed to parse geo.toml: {e}. Using coordinates from main config.");
            }
        },
        Err(e) => {
            log_warning!("Failed to read geo.toml: {e}. Using coordinates from main config.");
        }
    }

    Ok(())
}
