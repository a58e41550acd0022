//! Time source abstraction for real and simulated clocks.
//!
//! The scheduler never reads the system clock directly: it asks a
//! [`TimeSource`] for `now` and sleeps through it. The real source wraps the
//! system clock; the simulated source either jumps instantly through sleeps
//! (fast-forward) or scales them by a multiplier, which is how schedules
//! spanning days are exercised in seconds.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

/// Process-wide time source used by logging and the CLI, defaults to real time.
static TIME_SOURCE: OnceCell<Arc<dyn TimeSource>> = OnceCell::new();

/// Trait for abstracting time operations.
pub trait TimeSource: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Sleep for the given duration (or simulate it).
    fn sleep(&self, duration: StdDuration);

    /// Whether this source is simulated.
    fn is_simulated(&self) -> bool;

    /// Whether a simulation has reached its end (always false for real time).
    fn is_ended(&self) -> bool {
        false
    }
}

/// System clock.
pub struct RealTimeSource;

impl TimeSource for RealTimeSource {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }

    fn is_simulated(&self) -> bool {
        false
    }
}

/// Simulated clock between a start and an end instant.
///
/// - Fast-forward (`multiplier == 0.0`): `sleep` advances the clock by exactly
///   the requested duration without waiting.
/// - Accelerated (`multiplier > 0.0`): `sleep` waits `duration / multiplier` of
///   real time and then advances the clock by `duration`.
///
/// The clock never moves past `end`.
pub struct SimulatedTimeSource {
    end: DateTime<Utc>,
    multiplier: f64,
    current: Mutex<DateTime<Utc>>,
}

impl SimulatedTimeSource {
    /// Create a simulated source. Negative multipliers fall back to 3600x.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, multiplier: f64) -> Self {
        let multiplier = if multiplier < 0.0 || multiplier.is_nan() {
            3600.0
        } else {
            multiplier
        };
        Self {
            end,
            multiplier,
            current: Mutex::new(start),
        }
    }

    /// Fast-forward source: sleeping is instantaneous.
    pub fn fast_forward(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::new(start, end, 0.0)
    }

    /// Move the clock forward without sleeping, capped at the end instant.
    pub fn advance(&self, duration: StdDuration) {
        let step = ChronoDuration::milliseconds(duration.as_millis().min(i64::MAX as u128) as i64);
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = (*current + step).min(self.end);
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

impl TimeSource for SimulatedTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sleep(&self, duration: StdDuration) {
        let remaining = (self.end - self.now()).to_std().unwrap_or(StdDuration::ZERO);
        let step = duration.min(remaining);

        if self.multiplier > 0.0 && !step.is_zero() {
            std::thread::sleep(StdDuration::from_secs_f64(
                step.as_secs_f64() / self.multiplier,
            ));
        }
        self.advance(step);
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn is_ended(&self) -> bool {
        self.now() >= self.end
    }
}

/// Install the process-wide time source (first call wins).
pub fn init_time_source(source: Arc<dyn TimeSource>) {
    TIME_SOURCE.set(source).ok();
}

/// Whether a process-wide time source was installed.
pub fn is_initialized() -> bool {
    TIME_SOURCE.get().is_some()
}

/// The process-wide time source.
pub fn global() -> Arc<dyn TimeSource> {
    TIME_SOURCE.get_or_init(|| Arc::new(RealTimeSource)).clone()
}

/// Current instant of the process-wide time source.
pub fn now() -> DateTime<Utc> {
    TIME_SOURCE.get_or_init(|| Arc::new(RealTimeSource)).now()
}

/// Whether the process-wide time source is simulated.
pub fn is_simulated() -> bool {
    TIME_SOURCE
        .get_or_init(|| Arc::new(RealTimeSource))
        .is_simulated()
}

/// Parse `YYYY-MM-DD HH:MM:SS` in the given zone into a UTC instant.
pub fn parse_datetime_in<Z: TimeZone>(s: &str, zone: &Z) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("Nonexistent local time: {s}"))
}

/// Parse `YYYY-MM-DD HH:MM:SS` as UTC.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    parse_datetime_in(s, &Utc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        parse_datetime(s).unwrap()
    }

    #[test]
    fn test_fast_forward_sleep_advances_exactly() {
        let source = SimulatedTimeSource::fast_forward(
            at("2024-03-01 00:00:00"),
            at("2024-03-02 00:00:00"),
        );
        source.sleep(StdDuration::from_millis(90 * 60 * 1000 + 7));
        assert_eq!(
            source.now(),
            at("2024-03-01 01:30:00") + ChronoDuration::milliseconds(7)
        );
        assert!(!source.is_ended());
    }

    #[test]
    fn test_simulated_clock_caps_at_end() {
        let source = SimulatedTimeSource::fast_forward(
            at("2024-03-01 00:00:00"),
            at("2024-03-01 01:00:00"),
        );
        source.sleep(StdDuration::from_secs(7200));
        assert_eq!(source.now(), at("2024-03-01 01:00:00"));
        assert!(source.is_ended());
    }

    #[test]
    fn test_parse_datetime_in_zone() {
        let berlin = chrono_tz::Europe::Berlin;
        let parsed = parse_datetime_in("2024-07-01 12:00:00", &berlin).unwrap();
        assert_eq!(parsed, at("2024-07-01 10:00:00"));
        assert!(parse_datetime("2024-07-01T12:00").is_err());
    }
}
