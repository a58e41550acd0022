//! Recurring interval node.

use std::sync::Arc;

use super::{MessageEmitter, ScheduledEvent, StatusLevel, StatusSink, TimeData};
use crate::astro::DayBoundary;
use crate::error::Result;
use crate::schedule::{
    Action, EventKind, Phase, ScheduleConfig, ScheduleEngine, TimeResolver, TimerId,
    TimerPlatform,
};

/// A named node that emits events on its schedule.
///
/// Manual triggers emit immediately and never touch the timers.
pub struct IntervalNode {
    name: String,
    engine: ScheduleEngine,
    status: Box<dyn StatusSink>,
    emitter: Box<dyn MessageEmitter>,
}

impl IntervalNode {
    pub fn new(
        name: impl Into<String>,
        config: ScheduleConfig,
        resolver: Arc<dyn TimeResolver>,
        boundary: DayBoundary,
        status: Box<dyn StatusSink>,
        emitter: Box<dyn MessageEmitter>,
    ) -> Self {
        Self {
            name: name.into(),
            engine: ScheduleEngine::new(config, resolver, boundary),
            status,
            emitter,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &ScheduleEngine {
        &self.engine
    }

    /// Arm the schedule. Failures are reported through the status sink.
    pub fn start(&mut self, platform: &mut dyn TimerPlatform) {
        let outcome = self.engine.start(platform);
        self.report(outcome);
    }

    /// Handle a fired timer. Returns false if the id belongs to another node.
    pub fn on_timer(&mut self, id: TimerId, platform: &mut dyn TimerPlatform) -> bool {
        let Some(action) = self.engine.on_timer_fired(id, platform) else {
            return false;
        };

        if let Some(kind) = action.event() {
            self.emit(kind, platform);
        }
        if let Action::EmitOnly { .. } = action {
            return true;
        }
        match (self.engine.phase(), self.engine.last_error().cloned()) {
            (Phase::Running, Some(e)) => {
                self.status.report_error(&e.to_string());
                let text = format!("keeping previous schedule: {e}");
                self.status.set_status(StatusLevel::Warning, &text);
            }
            (_, Some(e)) => self.report(Err(e)),
            (_, None) => self.report(Ok(())),
        }
        true
    }

    /// Emit right away without changing any timer.
    pub fn trigger(&mut self, platform: &dyn TimerPlatform) {
        self.emit(EventKind::Manual, platform);
    }

    /// Swap in a new schedule and start over.
    pub fn reconfigure(&mut self, config: ScheduleConfig, platform: &mut dyn TimerPlatform) {
        let outcome = self.engine.reconfigure(config, platform);
        self.report(outcome);
    }

    /// Clear every timer of this node.
    pub fn close(&mut self, platform: &mut dyn TimerPlatform) {
        self.engine.cancel(platform);
        self.status.set_status(StatusLevel::Idle, "stopped");
    }

    fn emit(&mut self, kind: EventKind, platform: &dyn TimerPlatform) {
        let event = ScheduledEvent {
            kind,
            node: self.name.clone(),
            time_data: TimeData::new(platform.now(), self.engine.schedule()),
        };
        log_debug!("[{}] emitting {:?}", self.name, kind);
        self.emitter.emit(event);
    }

    fn report(&mut self, outcome: Result<()>) {
        if let Err(e) = outcome {
            self.status.report_error(&e.to_string());
            let text = match self.engine.phase() {
                Phase::Initializing => "error, retrying in 6 minutes".to_string(),
                _ => format!("error: {e}"),
            };
            self.status.set_status(StatusLevel::Error, &text);
            return;
        }

        if self.engine.phase() == Phase::Done {
            self.status.set_status(StatusLevel::Idle, "done");
            return;
        }
        let Some(schedule) = self.engine.schedule() else {
            return;
        };
        let next = schedule.next_start.format("%Y-%m-%d %H:%M:%S");
        match (&schedule.warning, schedule.inside_window, schedule.next_end) {
            (Some(warning), _, _) => {
                let text = warning.to_string();
                self.status.set_status(StatusLevel::Warning, &text);
            }
            (None, true, Some(end)) => {
                let text = format!("active until {}", end.format("%Y-%m-%d %H:%M:%S"));
                self.status.set_status(StatusLevel::Ok, &text);
            }
            _ => {
                let text = format!("next {next}");
                self.status.set_status(StatusLevel::Ok, &text);
            }
        }
    }
}
