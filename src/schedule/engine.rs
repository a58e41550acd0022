//! Recurring schedule state machine.
//!
//! The engine owns one [`RoleTimer`] per role and turns fired timer ids into
//! [`Action`]s. It never emits messages itself; the node that owns it decides
//! what an action means for downstream consumers.
//!
//! ## Lifecycle
//!
//! `start` resolves the first schedule. If that fails the engine stays in
//! [`Phase::Initializing`] and arms a single retry; a second failure moves it
//! to [`Phase::Failed`] until it is started again. Once running, resolution
//! errors are logged and the previous schedule stays armed.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::resolver::TimeResolver;
use super::spec::{ScheduleConfig, ScheduleSpec};
use super::timer::{Fired, RoleTimer, TimerId, TimerPlatform, TimerRole, TimerState};
use super::window::{DateRange, RangeCheck, is_inside_window};
use crate::astro::DayBoundary;
use crate::common::constants::{INIT_RETRY_DELAY_MS, RECOMPUTE_INTERVAL_MS};
use crate::error::{Error, Result};

/// Kind of an emitted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Once,
    Start,
    Interval,
    Manual,
}

/// What the owner should do after a timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Emit, the engine has already re-armed the next occurrence.
    EmitAndReschedule { event: EventKind },
    /// Nothing to emit; timers were recomputed.
    RecomputeOnly { role: TimerRole },
    EmitOnly { event: EventKind },
}

impl Action {
    pub fn event(&self) -> Option<EventKind> {
        match self {
            Self::EmitAndReschedule { event } | Self::EmitOnly { event } => Some(*event),
            Self::RecomputeOnly { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Running,
    Failed,
    /// A one-shot schedule fired and has nothing left to arm.
    Done,
}

/// The currently armed schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    pub computed_at: DateTime<Utc>,
    pub next_start: DateTime<Utc>,
    pub next_end: Option<DateTime<Utc>>,
    pub is_fixed: bool,
    /// A window is open right now.
    pub inside_window: bool,
    /// Set when the date range excludes now.
    pub warning: Option<Error>,
}

pub struct ScheduleEngine {
    config: ScheduleConfig,
    resolver: Arc<dyn TimeResolver>,
    boundary: DayBoundary,
    phase: Phase,
    retried: bool,
    schedule: Option<Schedule>,
    last_error: Option<Error>,
    once: RoleTimer,
    start: RoleTimer,
    end: RoleTimer,
    interval: RoleTimer,
    recompute: RoleTimer,
    retry: RoleTimer,
}

impl ScheduleEngine {
    pub fn new(
        config: ScheduleConfig,
        resolver: Arc<dyn TimeResolver>,
        boundary: DayBoundary,
    ) -> Self {
        Self {
            config,
            resolver,
            boundary,
            phase: Phase::Initializing,
            retried: false,
            schedule: None,
            last_error: None,
            once: RoleTimer::new(TimerRole::Once),
            start: RoleTimer::new(TimerRole::Start),
            end: RoleTimer::new(TimerRole::End),
            interval: RoleTimer::new(TimerRole::Interval),
            recompute: RoleTimer::new(TimerRole::Recompute),
            retry: RoleTimer::new(TimerRole::Retry),
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref()
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn timer_state(&self, role: TimerRole) -> TimerState {
        self.timer(role).state()
    }

    fn timer(&self, role: TimerRole) -> &RoleTimer {
        match role {
            TimerRole::Once => &self.once,
            TimerRole::Start => &self.start,
            TimerRole::End => &self.end,
            TimerRole::Interval => &self.interval,
            TimerRole::Recompute => &self.recompute,
            TimerRole::Retry => &self.retry,
        }
    }

    /// Arm everything from scratch.
    ///
    /// An error means the first resolution failed; a retry is armed unless
    /// one already failed.
    pub fn start(&mut self, platform: &mut dyn TimerPlatform) -> Result<()> {
        self.cancel(platform);
        self.phase = Phase::Initializing;
        self.retried = false;
        self.schedule = None;
        self.last_error = None;

        if let Some(delay) = self.config.once_delay_ms {
            self.once.arm_after(platform, delay)?;
        }
        self.initialize(platform)
    }

    /// Replace the configuration and start over.
    pub fn reconfigure(
        &mut self,
        config: ScheduleConfig,
        platform: &mut dyn TimerPlatform,
    ) -> Result<()> {
        self.cancel(platform);
        self.config = config;
        self.start(platform)
    }

    /// Clear every owned timer. Safe to call repeatedly.
    pub fn cancel(&mut self, platform: &mut dyn TimerPlatform) {
        for timer in [
            &mut self.once,
            &mut self.start,
            &mut self.end,
            &mut self.interval,
            &mut self.recompute,
            &mut self.retry,
        ] {
            timer.cancel(platform);
        }
    }

    /// Route a fired timer. `None` if the id is not ours.
    pub fn on_timer_fired(
        &mut self,
        id: TimerId,
        platform: &mut dyn TimerPlatform,
    ) -> Option<Action> {
        if self.once.fire(id).is_some() {
            return Some(Action::EmitOnly {
                event: EventKind::Once,
            });
        }

        if self.retry.fire(id).is_some() {
            log_debug!("Retrying schedule initialization");
            // Outcome is recorded in phase and last_error
            let _ = self.initialize(platform);
            return Some(Action::RecomputeOnly {
                role: TimerRole::Retry,
            });
        }

        if let Some(fired) = self.start.fire(id) {
            self.refresh(platform);
            return Some(match fired {
                Fired::Recheck(_) => Action::RecomputeOnly {
                    role: TimerRole::Start,
                },
                _ => Action::EmitAndReschedule {
                    event: EventKind::Start,
                },
            });
        }

        if self.end.fire(id).is_some() {
            self.refresh(platform);
            return Some(Action::RecomputeOnly {
                role: TimerRole::End,
            });
        }

        if self.interval.fire(id).is_some() {
            return Some(self.on_interval_tick(platform));
        }

        if self.recompute.fire(id).is_some() {
            self.refresh(platform);
            return Some(Action::RecomputeOnly {
                role: TimerRole::Recompute,
            });
        }

        None
    }

    fn on_interval_tick(&mut self, platform: &mut dyn TimerPlatform) -> Action {
        let now = platform.now();

        if let (ScheduleSpec::Periodic(interval), Some(range)) =
            (&self.config.schedule, &self.config.date_range)
        {
            if matches!(range.check(now, &self.boundary), RangeCheck::Outside { .. }) {
                log_debug!("Date range {} closed, pausing interval", range);
                self.refresh(platform);
                return Action::RecomputeOnly {
                    role: TimerRole::Interval,
                };
            }
            let period = Duration::milliseconds(interval.period_ms() as i64);
            if let Some(schedule) = self.schedule.as_mut() {
                schedule.computed_at = now;
                schedule.next_start = now + period;
            }
        }

        if let (ScheduleSpec::Window { .. }, Some(next_end)) = (
            &self.config.schedule,
            self.schedule.as_ref().and_then(|s| s.next_end),
        ) && now >= next_end
        {
            // The window closes on this tick
            self.refresh(platform);
            return Action::RecomputeOnly {
                role: TimerRole::Interval,
            };
        }

        Action::EmitOnly {
            event: EventKind::Interval,
        }
    }

    fn initialize(&mut self, platform: &mut dyn TimerPlatform) -> Result<()> {
        let outcome = self
            .compute(platform.now())
            .and_then(|schedule| self.apply(schedule, platform));

        match outcome {
            Ok(()) => {
                self.phase = Phase::Running;
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                self.last_error = Some(e.clone());
                if self.retried {
                    self.phase = Phase::Failed;
                    self.cancel_schedule_timers(platform);
                } else {
                    self.retried = true;
                    self.phase = Phase::Initializing;
                    self.retry.arm_after(platform, INIT_RETRY_DELAY_MS)?;
                }
                Err(e)
            }
        }
    }

    /// Recompute after initialization. Failures keep the previous schedule.
    fn refresh(&mut self, platform: &mut dyn TimerPlatform) {
        if self.is_exhausted(platform.now()) {
            self.cancel_schedule_timers(platform);
            self.phase = Phase::Done;
            self.last_error = None;
            log_debug!("One-shot schedule finished");
            return;
        }

        let outcome = self
            .compute(platform.now())
            .and_then(|schedule| self.apply(schedule, platform));

        match outcome {
            Ok(()) => {
                self.phase = Phase::Running;
                self.last_error = None;
            }
            Err(e) => {
                log_warning!("Keeping previous schedule: {}", e);
                self.last_error = Some(e);
                if !self.recompute.is_repeating()
                    && let Err(e) = self.recompute.repeat(platform, RECOMPUTE_INTERVAL_MS)
                {
                    log_error!("Unable to arm recompute timer: {}", e);
                }
            }
        }
    }

    fn cancel_schedule_timers(&mut self, platform: &mut dyn TimerPlatform) {
        for timer in [
            &mut self.start,
            &mut self.end,
            &mut self.interval,
            &mut self.recompute,
        ] {
            timer.cancel(platform);
        }
    }

    /// Start of a one-shot schedule that already began.
    fn one_shot_started(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.config
            .schedule
            .start_spec()?
            .absolute_value()
            .filter(|start| *start <= now)
    }

    /// A one-shot start passed and its window, if any, has closed.
    fn is_exhausted(&self, now: DateTime<Utc>) -> bool {
        let Some(started) = self.one_shot_started(now) else {
            return false;
        };
        match &self.config.schedule {
            ScheduleSpec::Window { end, .. } => self
                .resolver
                .resolve(end, started)
                .map(|end| end.value <= now)
                .unwrap_or(true),
            _ => true,
        }
    }

    /// Resolve the schedule as seen from `now`. Start and end share `now`.
    pub fn compute(&self, now: DateTime<Utc>) -> Result<Schedule> {
        let one_shot = self.one_shot_started(now);
        let mut schedule = match (&self.config.schedule, one_shot) {
            (ScheduleSpec::Periodic(interval), _) => Schedule {
                computed_at: now,
                next_start: now + Duration::milliseconds(interval.period_ms() as i64),
                next_end: None,
                is_fixed: true,
                inside_window: false,
                warning: None,
            },
            (ScheduleSpec::At(spec), _) => {
                let resolved = self.resolver.resolve(spec, now)?;
                Schedule {
                    computed_at: now,
                    next_start: resolved.value,
                    next_end: None,
                    is_fixed: resolved.is_fixed,
                    inside_window: false,
                    warning: None,
                }
            }
            (ScheduleSpec::Window { end, .. }, Some(started)) => {
                // A one-shot window stays open until the first end after it began
                let end = self.resolver.resolve(end, started)?;
                if end.value <= now {
                    return Err(Error::UnresolvableTime(format!(
                        "window opening {} already closed",
                        started.format("%Y-%m-%d %H:%M:%S")
                    )));
                }
                Schedule {
                    computed_at: now,
                    next_start: started,
                    next_end: Some(end.value),
                    is_fixed: true,
                    inside_window: true,
                    warning: None,
                }
            }
            (ScheduleSpec::Window { start, end, .. }, None) => {
                let start = self.resolver.resolve(start, now)?;
                let end = self.resolver.resolve(end, now)?;
                Schedule {
                    computed_at: now,
                    next_start: start.value,
                    next_end: Some(end.value),
                    is_fixed: start.is_fixed && end.is_fixed,
                    inside_window: is_inside_window(start.value, end.value),
                    warning: None,
                }
            }
        };

        if let Some(range) = &self.config.date_range
            && let RangeCheck::Outside { next_start } = self.range_check(range, &schedule, now)
        {
            let opening = range.opening(next_start, &self.boundary);
            let from = opening - Duration::milliseconds(1);
            schedule.next_start = match self.config.schedule.start_spec() {
                Some(spec) => self.resolver.resolve(spec, from)?.value,
                None => opening,
            };
            if let ScheduleSpec::Window { end, .. } = &self.config.schedule {
                schedule.next_end = Some(self.resolver.resolve(end, schedule.next_start)?.value);
            }
            schedule.inside_window = false;
            schedule.is_fixed = true;
            schedule.warning = Some(Error::OutOfRange {
                next_start: schedule.next_start,
            });
        }

        Ok(schedule)
    }

    /// Range check for `now`, and for the next start unless a window is open.
    ///
    /// Periodic ticks close the range themselves in `on_interval_tick`.
    fn range_check(&self, range: &DateRange, schedule: &Schedule, now: DateTime<Utc>) -> RangeCheck {
        match range.check(now, &self.boundary) {
            RangeCheck::Inside
                if !schedule.inside_window
                    && !matches!(self.config.schedule, ScheduleSpec::Periodic(_)) =>
            {
                range.check(schedule.next_start, &self.boundary)
            }
            check => check,
        }
    }

    fn apply(&mut self, schedule: Schedule, platform: &mut dyn TimerPlatform) -> Result<()> {
        let out_of_range = schedule.warning.is_some();

        match &self.config.schedule {
            ScheduleSpec::Periodic(interval) => {
                if out_of_range {
                    self.interval.cancel(platform);
                    self.start.arm(platform, schedule.next_start)?;
                } else {
                    self.start.cancel(platform);
                    if !self.interval.is_repeating() {
                        self.interval.repeat(platform, interval.period_ms())?;
                    }
                }
            }
            ScheduleSpec::At(_) => {
                self.start.arm(platform, schedule.next_start)?;
            }
            ScheduleSpec::Window { interval, .. } => {
                if let (true, Some(next_end)) = (schedule.inside_window, schedule.next_end) {
                    self.start.cancel(platform);
                    self.end.arm(platform, next_end)?;
                    if !self.interval.is_repeating() {
                        self.interval.repeat(platform, interval.period_ms())?;
                    }
                } else {
                    self.interval.cancel(platform);
                    self.end.cancel(platform);
                    self.start.arm(platform, schedule.next_start)?;
                }
            }
        }

        if schedule.is_fixed {
            self.recompute.cancel(platform);
        } else if !self.recompute.is_repeating() {
            self.recompute.repeat(platform, RECOMPUTE_INTERVAL_MS)?;
        }

        log_debug!(
            "Next start {}{}",
            schedule.next_start.format("%Y-%m-%d %H:%M:%S"),
            schedule
                .next_end
                .map(|end| format!(", next end {}", end.format("%Y-%m-%d %H:%M:%S")))
                .unwrap_or_default()
        );
        self.schedule = Some(schedule);
        Ok(())
    }
}
