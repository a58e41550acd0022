//! # suntimer
//!
//! Solar and lunar event times plus a recurring schedule timer engine.
//!
//! The library backs the `suntimer` binary and keeps CLI dispatch (main.rs)
//! separate from the logic so the internals can be tested directly.
//!
//! ## Architecture
//!
//! - **Astronomy**: `astro` computes the sun time table, sun and moon positions,
//!   moon rise/set and illumination, with a per-day cache
//! - **Scheduling**: `schedule` turns interval, absolute and astronomical time
//!   specifications into concrete instants and drives timers through the
//!   `TimerPlatform` seam
//! - **Nodes**: `node` hosts named interval nodes on a single-threaded runtime
//! - **Configuration**: `config` loads and validates the TOML file
//! - **Commands**: `commands` implements the CLI subcommands
//! - **Infrastructure**: clock abstraction (`time`), signal handling, logging

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod astro;
pub mod commands;
pub mod common;
pub mod config;
pub mod error;
pub mod node;
pub mod schedule;
pub mod signals;
pub mod time;

pub use error::{Error, Result};
