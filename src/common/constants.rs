//! Application-wide constants.
//!
//! Timer limits mirror the event-loop platform the scheduler was designed for:
//! the real ceiling on a single timeout is a signed 32-bit millisecond count, and
//! the engine keeps well clear of it by chaining recheck timers.

// # Timer platform limits

/// Largest delay a single platform timer can hold (~24.8 days).
pub const MAX_TIMEOUT_MS: u64 = 2_147_483_647;

/// Remaining delays above this are not armed directly (4 days).
pub const RECHECK_THRESHOLD_MS: u64 = 345_600_000;

/// A recheck timer fires this long before the real target (1.5 days).
pub const RECHECK_MARGIN_MS: u64 = 129_600_000;

/// Minimum delay for a scheduled target; smaller or negative delays roll over to the next day.
pub const MIN_SCHEDULE_DELAY_MS: i64 = 10;

/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

// # Schedule engine cadence

/// Retry delay after a failed initial resolution (6 minutes).
pub const INIT_RETRY_DELAY_MS: u64 = 360_000;

/// Period of the recompute interval for non-fixed schedules (2 hours).
pub const RECOMPUTE_INTERVAL_MS: u64 = 7_200_000;

/// Default delay of the initial "once" emission.
pub const DEFAULT_ONCE_DELAY_MS: u64 = 100;

/// How many days ahead the resolver searches for an accepted day.
pub const MAX_RESOLVE_SEARCH_DAYS: i64 = 370;

// # Astronomy

/// Mean Earth-Sun distance in kilometres, used for lunar illumination.
pub const SUN_DISTANCE_KM: f64 = 149_598_000.0;

/// Moon horizon correction (apparent radius plus refraction), in degrees.
pub const MOON_HORIZON_CORRECTION_DEG: f64 = 0.133;

// # Configuration

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "suntimer.toml";

/// Directory below the XDG config home.
pub const CONFIG_DIR_NAME: &str = "suntimer";

/// Default coordinates written into a freshly generated configuration (Berlin).
pub const DEFAULT_LATITUDE: f64 = 52.52;
pub const DEFAULT_LONGITUDE: f64 = 13.405;

/// Polling granularity of the real-time runtime loop, so signals are noticed.
pub const RUNTIME_POLL_MS: u64 = 1_000;

// # Exit codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
