//! Pure delay arithmetic for arming timers.
//!
//! A target instant becomes a platform delay in two steps: [`schedule_delay`]
//! turns it into a positive millisecond count (rolling past targets over to the
//! next day), and [`next_arm_delay`] decides whether that count can be armed
//! directly or must be approached through an intermediate recheck.

use chrono::{DateTime, Utc};

use crate::common::constants::{
    DAY_MS, MAX_TIMEOUT_MS, MIN_SCHEDULE_DELAY_MS, RECHECK_MARGIN_MS, RECHECK_THRESHOLD_MS,
};

/// Milliseconds from `now` until `target`.
///
/// Delays below the minimum (including negative ones) are moved forward in
/// whole days until they clear it: a time of day that already passed means the
/// same time tomorrow.
pub fn schedule_delay(now: DateTime<Utc>, target: DateTime<Utc>) -> u64 {
    let delay = (target - now).num_milliseconds();
    if delay >= MIN_SCHEDULE_DELAY_MS {
        return delay as u64;
    }
    let days = (MIN_SCHEDULE_DELAY_MS - delay + DAY_MS - 1) / DAY_MS;
    (delay + days * DAY_MS) as u64
}

/// How the next platform timer for a remaining delay is armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmDelay {
    /// Arm the real target.
    Final(u64),
    /// Arm an intermediate timer and recompute the target when it fires.
    Recheck(u64),
}

impl ArmDelay {
    pub fn delay_ms(&self) -> u64 {
        match self {
            Self::Final(ms) | Self::Recheck(ms) => *ms,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Final(_))
    }
}

/// Split a remaining delay against the platform ceiling.
pub fn next_arm_delay(remaining_ms: u64) -> ArmDelay {
    if remaining_ms > RECHECK_THRESHOLD_MS {
        ArmDelay::Recheck((remaining_ms - RECHECK_MARGIN_MS).min(MAX_TIMEOUT_MS - 1))
    } else {
        ArmDelay::Final(remaining_ms)
    }
}
