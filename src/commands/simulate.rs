//! `suntimer simulate`: run the configured nodes on a simulated clock.
//!
//! Start and end are wall-clock times of the configured day boundary zone.
//! With a multiplier of 0 the clock jumps from deadline to deadline, otherwise
//! it advances `multiplier` times faster than real time and can be interrupted
//! with Ctrl+C.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::display_time;
use super::run::build_runtime;
use crate::config::Config;
use crate::signals::setup_signal_handler;
use crate::time::{SimulatedTimeSource, TimeSource, init_time_source};

/// Parsed simulation bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SimulationWindow {
    pub fn parse(config: &Config, start: &str, end: &str) -> Result<Self> {
        let boundary = config.day_boundary()?;
        let start = boundary
            .parse_datetime(start)
            .map_err(anyhow::Error::msg)
            .context("Invalid simulation start")?;
        let end = boundary
            .parse_datetime(end)
            .map_err(anyhow::Error::msg)
            .context("Invalid simulation end")?;
        if end <= start {
            anyhow::bail!("Simulation end must be after its start");
        }
        Ok(Self { start, end })
    }
}

pub fn run_simulate_command(
    config: &Config,
    start: &str,
    end: &str,
    multiplier: f64,
    json: bool,
) -> Result<()> {
    let window = SimulationWindow::parse(config, start, end)?;
    let boundary = config.day_boundary()?;

    let source = Arc::new(SimulatedTimeSource::new(window.start, window.end, multiplier));
    init_time_source(source.clone());

    let mut runtime = build_runtime(config, source.clone(), json)?;

    log_block_start!(
        "Simulating {} to {}",
        display_time(window.start, &boundary),
        display_time(window.end, &boundary)
    );
    if multiplier == 0.0 {
        log_indented!("Fast-forward mode");
    } else {
        log_indented!("Time multiplier: {}x", multiplier);
    }

    runtime.start();
    let fired = if multiplier == 0.0 {
        let fired = runtime.run_until(window.end);
        runtime.shutdown();
        Some(fired)
    } else {
        let signals = setup_signal_handler()?;
        runtime.run(&signals)?;
        None
    };

    log_block_start!(
        "Simulation stopped at {}",
        display_time(source.now(), &boundary)
    );
    if let Some(fired) = fired {
        log_indented!("{} timer callback(s) dispatched", fired);
    }
    log_end!();
    Ok(())
}
