//! Configuration validation functionality.
//!
//! Rejects configurations the scheduler could never run: coordinates out of
//! range, periods that are zero or exceed a single platform timer, malformed
//! dates and unknown event names.

use anyhow::{Context, Result};
use std::collections::HashSet;

use super::{Config, IntervalConfig, NodeConfig, ScheduleSection, TimeConfig};
use crate::common::constants::*;

/// Validate a parsed configuration.
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(lat) = config.location.latitude
        && !(-90.0..=90.0).contains(&lat)
    {
        anyhow::bail!("latitude must be between -90 and 90 degrees (got {})", lat);
    }

    if let Some(lon) = config.location.longitude
        && !(-180.0..=180.0).contains(&lon)
    {
        anyhow::bail!(
            "longitude must be between -180 and 180 degrees (got {})",
            lon
        );
    }

    if let Some(height) = config.location.height
        && !(height.is_finite() && height >= 0.0)
    {
        anyhow::bail!("height must be a non-negative number of metres (got {})", height);
    }

    let boundary = config.day_boundary()?;

    if !config.nodes.is_empty() {
        config
            .coordinate()
            .context("Nodes are configured but the location is incomplete")?;
    }

    let mut names = HashSet::new();
    for node in &config.nodes {
        if node.name.trim().is_empty() {
            anyhow::bail!("node name must not be empty");
        }
        if !names.insert(node.name.as_str()) {
            anyhow::bail!("duplicate node name '{}'", node.name);
        }
        validate_node(node).with_context(|| format!("Invalid node '{}'", node.name))?;
        node.schedule_config(&boundary)
            .with_context(|| format!("Invalid node '{}'", node.name))?;
    }

    Ok(())
}

fn validate_node(node: &NodeConfig) -> Result<()> {
    if let Some(delay) = node.once_delay_ms
        && delay > MAX_TIMEOUT_MS
    {
        anyhow::bail!(
            "once_delay_ms ({}) exceeds the largest timer delay ({} ms)",
            delay,
            MAX_TIMEOUT_MS
        );
    }

    match &node.schedule {
        ScheduleSection::Periodic { interval } => validate_interval(interval)?,
        ScheduleSection::At { time } => validate_time(time)?,
        ScheduleSection::Window {
            start,
            end,
            interval,
        } => {
            validate_time(start)?;
            validate_time(end)?;
            validate_interval(interval)?;
        }
    }

    if let Some(range) = &node.date_range {
        range.range().context("Invalid date_range (use \"MM-DD\")")?;
    }
    Ok(())
}

fn validate_interval(interval: &IntervalConfig) -> Result<()> {
    if !interval.value.is_finite() || interval.value <= 0.0 {
        anyhow::bail!("interval value must be positive (got {})", interval.value);
    }
    let period_ms = interval.spec()?.period_ms();
    if period_ms == 0 {
        anyhow::bail!("interval is shorter than one millisecond");
    }
    if period_ms > MAX_TIMEOUT_MS {
        anyhow::bail!(
            "interval of {} ms exceeds the largest timer delay ({} ms)",
            period_ms,
            MAX_TIMEOUT_MS
        );
    }
    Ok(())
}

fn validate_time(time: &TimeConfig) -> Result<()> {
    if let Some(offset) = time.offset
        && !offset.is_finite()
    {
        anyhow::bail!("offset must be a finite number");
    }
    if let Some(month) = time.months.iter().flatten().find(|m| !(1..=12).contains(*m)) {
        anyhow::bail!("months must be between 1 and 12 (got {})", month);
    }
    Ok(())
}
