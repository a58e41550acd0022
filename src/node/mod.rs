//! Recurring interval nodes and the host runtime that drives them.
//!
//! A node talks to the outside world through two narrow seams: a
//! [`StatusSink`] for its status indicator and a [`MessageEmitter`] for the
//! events it produces. Both are one-way; nothing they do feeds back into
//! scheduling.

pub mod interval;
pub mod runtime;

pub use interval::IntervalNode;
pub use runtime::Runtime;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schedule::{EventKind, Schedule};

/// Severity of a node status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Ok,
    Warning,
    Error,
    Idle,
}

/// Status indicator of a node.
pub trait StatusSink {
    fn set_status(&mut self, level: StatusLevel, text: &str);

    fn report_error(&mut self, message: &str);
}

/// [`StatusSink`] that writes through the logger.
pub struct LogStatusSink {
    node: String,
}

impl LogStatusSink {
    pub fn new(node: impl Into<String>) -> Self {
        Self { node: node.into() }
    }
}

impl StatusSink for LogStatusSink {
    fn set_status(&mut self, level: StatusLevel, text: &str) {
        match level {
            StatusLevel::Ok | StatusLevel::Idle => log_decorated!("[{}] {}", self.node, text),
            StatusLevel::Warning => log_warning!("[{}] {}", self.node, text),
            StatusLevel::Error => log_error!("[{}] {}", self.node, text),
        }
    }

    fn report_error(&mut self, message: &str) {
        log_error!("[{}] {}", self.node, message);
    }
}

/// Receives the events a node produces.
pub trait MessageEmitter {
    fn emit(&mut self, event: ScheduledEvent);
}

impl<F: FnMut(ScheduledEvent)> MessageEmitter for F {
    fn emit(&mut self, event: ScheduledEvent) {
        self(event)
    }
}

/// Schedule snapshot attached to every event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeData {
    pub now: DateTime<Utc>,
    pub next_start: Option<DateTime<Utc>>,
    pub next_end: Option<DateTime<Utc>>,
    pub is_fixed: bool,
    pub warning: Option<String>,
}

impl TimeData {
    pub fn new(now: DateTime<Utc>, schedule: Option<&Schedule>) -> Self {
        Self {
            now,
            next_start: schedule.map(|s| s.next_start),
            next_end: schedule.and_then(|s| s.next_end),
            is_fixed: schedule.is_some_and(|s| s.is_fixed),
            warning: schedule.and_then(|s| s.warning.as_ref()).map(|w| w.to_string()),
        }
    }
}

/// A message produced by a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduledEvent {
    pub kind: EventKind,
    pub node: String,
    pub time_data: TimeData,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use chrono::TimeZone;

    #[test]
    fn test_event_serializes_as_json() {
        let now = Utc.with_ymd_and_hms(2024, 11, 1, 6, 0, 0).unwrap();
        let next = Utc.with_ymd_and_hms(2024, 11, 2, 0, 0, 0).unwrap();
        let schedule = Schedule {
            computed_at: now,
            next_start: next,
            next_end: None,
            is_fixed: true,
            inside_window: false,
            warning: Some(Error::OutOfRange { next_start: next }),
        };
        let event = ScheduledEvent {
            kind: EventKind::Manual,
            node: "porch".into(),
            time_data: TimeData::new(now, Some(&schedule)),
        };

        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "manual");
        assert_eq!(json["node"], "porch");
        assert_eq!(json["time_data"]["next_start"], "2024-11-02T00:00:00Z");
        assert_eq!(json["time_data"]["next_end"], serde_json::Value::Null);
        assert_eq!(json["time_data"]["is_fixed"], true);
        assert!(
            json["time_data"]["warning"]
                .as_str()
                .unwrap()
                .contains("date range")
        );
    }

    #[test]
    fn test_time_data_without_schedule() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let data = TimeData::new(now, None);
        assert_eq!(data.next_start, None);
        assert!(!data.is_fixed);
        assert_eq!(data.warning, None);
    }
}
