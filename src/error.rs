//! Domain error types shared by the astronomy core and the schedule engine.
//!
//! Application-level flows (configuration loading, CLI dispatch) wrap these in
//! `anyhow::Error`; the core itself returns [`Error`] so callers can match on the
//! failure class and decide between retrying, warning, or giving up.

use chrono::{DateTime, Utc};

/// Failure classes of the core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Latitude or longitude is NaN or outside its valid range.
    #[error("invalid coordinate: latitude={latitude}, longitude={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// The time resolver could not turn a specification into an instant.
    #[error("unable to resolve time: {0}")]
    UnresolvableTime(String),

    /// The enabled date range excludes the current date. Callers treat this as
    /// a warning: the schedule is still armed for `next_start`.
    #[error("date range excludes now, next start at {next_start}")]
    OutOfRange { next_start: DateTime<Utc> },

    /// A collaborator or configuration value the operation needs is absent.
    #[error("missing configuration: {0}")]
    ConfigurationMissing(&'static str),

    /// A platform timer was requested with a delay the platform cannot hold.
    #[error("timer delay of {delay_ms} ms exceeds the platform maximum")]
    TimerOverflow { delay_ms: u64 },
}

impl Error {
    /// Whether the error should surface as a warning rather than a failure.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::OutOfRange { .. })
    }
}

/// Result alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
