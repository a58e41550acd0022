//! `suntimer run`: host the configured nodes on the process clock.
//!
//! Events go to stdout, either as decorated log blocks or as one JSON object
//! per line with `--json`.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::astro::AstroCache;
use crate::config::{self, Config};
use crate::node::{IntervalNode, LogStatusSink, MessageEmitter, Runtime, ScheduledEvent};
use crate::schedule::{AstroResolver, TimeResolver};
use crate::signals::setup_signal_handler;
use crate::time::TimeSource;

/// Build a runtime holding one interval node per configured `[[node]]`.
///
/// All nodes share one resolver and so one astronomical cache.
pub fn build_runtime(config: &Config, source: Arc<dyn TimeSource>, json: bool) -> Result<Runtime> {
    let schedules = config.node_schedules()?;
    if schedules.is_empty() {
        anyhow::bail!("No nodes configured. Add a [[node]] section to the configuration");
    }

    let coord = config.coordinate()?;
    let boundary = config.day_boundary()?;
    let cache = Arc::new(AstroCache::new(config.sun_options()));
    let resolver: Arc<dyn TimeResolver> =
        Arc::new(AstroResolver::new(coord, boundary, cache));

    let mut runtime = Runtime::new(source);
    for (name, schedule) in schedules {
        let node = IntervalNode::new(
            name.clone(),
            schedule,
            resolver.clone(),
            boundary,
            Box::new(LogStatusSink::new(name)),
            event_printer(json),
        );
        runtime.add_node(node)?;
    }
    Ok(runtime)
}

/// Emitter writing each event to stdout.
pub fn event_printer(json: bool) -> Box<dyn MessageEmitter> {
    Box::new(move |event: ScheduledEvent| {
        if json {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                // Logging is off in JSON mode
                Err(e) => eprintln!("Failed to serialize event from '{}': {}", event.node, e),
            }
            return;
        }

        let kind = format!("{:?}", event.kind).to_lowercase();
        log_block_start!("{}: {} event", event.node, kind);
        if let Some(next) = event.time_data.next_start {
            log_indented!("Next start: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if let Some(next) = event.time_data.next_end {
            log_indented!("Next end: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        if let Some(warning) = &event.time_data.warning {
            log_indented!("Note: {}", warning);
        }
    })
}

pub fn run_run_command(config: &Config, json: bool) -> Result<()> {
    let path = config::get_config_path()?;
    let source = crate::time::source::global();

    let mut runtime = build_runtime(config, source, json)?.with_reloader(Box::new(move || {
        let config = Config::load_from_path(&path)
            .with_context(|| format!("Failed to reload {}", path.display()))?;
        config.node_schedules()
    }));

    let signals = setup_signal_handler()?;

    config.log_config();
    log_block_start!("Starting {} node(s)", runtime.nodes().len());
    runtime.start();
    runtime.run(&signals)?;
    log_end!();
    Ok(())
}
