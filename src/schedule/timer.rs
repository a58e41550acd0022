//! Timer platform abstraction and the per-role timer state machine.
//!
//! A [`TimerPlatform`] hands out numbered one-shot and repeating timers, the
//! way an event loop does. Nodes never hold callbacks: the host asks the
//! platform which timer is due and routes its id back to the owning node.
//!
//! [`RoleTimer`] wraps one logical role (start, end, interval, ...) and keeps
//! the invariant that at most one platform timer is live per role: every arm
//! clears the previous handle first.

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::delay::{ArmDelay, next_arm_delay, schedule_delay};
use crate::common::constants::MAX_TIMEOUT_MS;
use crate::error::{Error, Result};
use crate::time::TimeSource;

pub type TimerId = u64;

/// Event-loop timer facility.
pub trait TimerPlatform {
    fn now(&self) -> DateTime<Utc>;

    /// One-shot timer. Delays above the platform maximum are rejected.
    fn set_timeout(&mut self, delay_ms: u64) -> Result<TimerId>;

    /// Repeating timer with the given period.
    fn set_interval(&mut self, period_ms: u64) -> Result<TimerId>;

    /// Clear a timer. Unknown or already fired ids are ignored.
    fn clear(&mut self, id: TimerId);

    /// Number of timers that can still fire.
    fn live_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy)]
struct QueuedTimer {
    deadline: DateTime<Utc>,
    period_ms: Option<u64>,
}

/// [`TimerPlatform`] over a [`TimeSource`].
///
/// Due timers are popped in deadline order, ties broken by creation order.
/// A repeating timer is re-queued at `deadline + period`, so a late pop does
/// not shift its cadence.
pub struct TimerQueue {
    source: Arc<dyn TimeSource>,
    next_id: TimerId,
    timers: BTreeMap<TimerId, QueuedTimer>,
}

impl TimerQueue {
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        Self {
            source,
            next_id: 1,
            timers: BTreeMap::new(),
        }
    }

    pub fn source(&self) -> &Arc<dyn TimeSource> {
        &self.source
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.values().map(|t| t.deadline).min()
    }

    /// Remove and return the earliest timer that is due at the current time.
    pub fn pop_due(&mut self) -> Option<TimerId> {
        let now = self.source.now();
        let (&id, &timer) = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= now)
            .min_by_key(|(id, t)| (t.deadline, **id))?;

        match timer.period_ms {
            Some(period) => {
                let next = timer.deadline + Duration::milliseconds(period as i64);
                self.timers.insert(
                    id,
                    QueuedTimer {
                        deadline: next,
                        period_ms: Some(period),
                    },
                );
            }
            None => {
                self.timers.remove(&id);
            }
        }
        Some(id)
    }

    pub fn is_live(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    fn push(&mut self, delay_ms: u64, period_ms: Option<u64>) -> Result<TimerId> {
        if delay_ms > MAX_TIMEOUT_MS {
            return Err(Error::TimerOverflow { delay_ms });
        }
        let id = self.next_id;
        self.next_id += 1;
        let deadline = self.source.now() + Duration::milliseconds(delay_ms as i64);
        self.timers.insert(
            id,
            QueuedTimer {
                deadline,
                period_ms,
            },
        );
        Ok(id)
    }
}

impl TimerPlatform for TimerQueue {
    fn now(&self) -> DateTime<Utc> {
        self.source.now()
    }

    fn set_timeout(&mut self, delay_ms: u64) -> Result<TimerId> {
        self.push(delay_ms, None)
    }

    fn set_interval(&mut self, period_ms: u64) -> Result<TimerId> {
        // A zero period would fire forever without time passing
        self.push(period_ms, Some(period_ms.max(1)))
    }

    fn clear(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    fn live_count(&self) -> usize {
        self.timers.len()
    }
}

/// Logical timer roles of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerRole {
    Once,
    Start,
    End,
    Interval,
    Recompute,
    Retry,
}

impl fmt::Display for TimerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Once => "once",
            Self::Start => "start",
            Self::End => "end",
            Self::Interval => "interval",
            Self::Recompute => "recompute",
            Self::Retry => "retry",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    /// Real timer for `target`.
    Armed {
        id: TimerId,
        target: DateTime<Utc>,
    },
    /// Intermediate timer; `target` is too far out to arm directly.
    Recheck {
        id: TimerId,
        target: DateTime<Utc>,
    },
    Repeating {
        id: TimerId,
        period_ms: u64,
    },
}

/// What a fired id meant to its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    Target(DateTime<Utc>),
    Recheck(DateTime<Utc>),
    Tick,
}

/// One role's timer.
#[derive(Debug, Clone, Copy)]
pub struct RoleTimer {
    role: TimerRole,
    state: TimerState,
}

impl RoleTimer {
    pub fn new(role: TimerRole) -> Self {
        Self {
            role,
            state: TimerState::Idle,
        }
    }

    pub fn role(&self) -> TimerRole {
        self.role
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == TimerState::Idle
    }

    pub fn is_repeating(&self) -> bool {
        matches!(self.state, TimerState::Repeating { .. })
    }

    /// Target of a pending one-shot (real or recheck).
    pub fn target(&self) -> Option<DateTime<Utc>> {
        match self.state {
            TimerState::Armed { target, .. } | TimerState::Recheck { target, .. } => Some(target),
            _ => None,
        }
    }

    fn id(&self) -> Option<TimerId> {
        match self.state {
            TimerState::Idle => None,
            TimerState::Armed { id, .. }
            | TimerState::Recheck { id, .. }
            | TimerState::Repeating { id, .. } => Some(id),
        }
    }

    pub fn owns(&self, id: TimerId) -> bool {
        self.id() == Some(id)
    }

    /// Arm for `target`, chaining through a recheck when it is too far out.
    ///
    /// Returns the platform delay that was armed.
    pub fn arm(&mut self, platform: &mut dyn TimerPlatform, target: DateTime<Utc>) -> Result<u64> {
        self.cancel(platform);
        let now = platform.now();
        let arm = next_arm_delay(schedule_delay(now, target));
        let id = platform.set_timeout(arm.delay_ms())?;

        self.state = match arm {
            ArmDelay::Final(_) => TimerState::Armed { id, target },
            ArmDelay::Recheck(ms) => {
                log_debug!(
                    "{} timer target {} is too far out, rechecking in {} h",
                    self.role,
                    target.format("%Y-%m-%d %H:%M:%S"),
                    ms / 3_600_000
                );
                TimerState::Recheck { id, target }
            }
        };
        Ok(arm.delay_ms())
    }

    /// Arm a plain one-shot `delay_ms` from now.
    pub fn arm_after(&mut self, platform: &mut dyn TimerPlatform, delay_ms: u64) -> Result<()> {
        self.cancel(platform);
        let target = platform.now() + Duration::milliseconds(delay_ms as i64);
        let id = platform.set_timeout(delay_ms)?;
        self.state = TimerState::Armed { id, target };
        Ok(())
    }

    /// Start repeating every `period_ms`.
    pub fn repeat(&mut self, platform: &mut dyn TimerPlatform, period_ms: u64) -> Result<()> {
        self.cancel(platform);
        let id = platform.set_interval(period_ms)?;
        self.state = TimerState::Repeating { id, period_ms };
        Ok(())
    }

    /// Clear the owned platform timer. Idle timers are left as they are.
    pub fn cancel(&mut self, platform: &mut dyn TimerPlatform) {
        if let Some(id) = self.id() {
            platform.clear(id);
        }
        self.state = TimerState::Idle;
    }

    /// Record that `id` fired. Returns `None` if this role does not own it.
    ///
    /// One-shots go back to idle; repeating timers stay live.
    pub fn fire(&mut self, id: TimerId) -> Option<Fired> {
        if !self.owns(id) {
            return None;
        }
        match self.state {
            TimerState::Armed { target, .. } => {
                self.state = TimerState::Idle;
                Some(Fired::Target(target))
            }
            TimerState::Recheck { target, .. } => {
                self.state = TimerState::Idle;
                Some(Fired::Recheck(target))
            }
            TimerState::Repeating { .. } => Some(Fired::Tick),
            TimerState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::{DAY_MS, RECHECK_MARGIN_MS};
    use crate::time::SimulatedTimeSource;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn queue() -> (Arc<SimulatedTimeSource>, TimerQueue) {
        let source = Arc::new(SimulatedTimeSource::fast_forward(
            start(),
            start() + Duration::days(60),
        ));
        let queue = TimerQueue::new(source.clone());
        (source, queue)
    }

    #[test]
    fn test_queue_orders_by_deadline_then_id() {
        let (source, mut queue) = queue();
        let late = queue.set_timeout(2_000).unwrap();
        let early_a = queue.set_timeout(1_000).unwrap();
        let early_b = queue.set_timeout(1_000).unwrap();

        assert_eq!(queue.pop_due(), None);
        source.advance(StdDuration::from_secs(5));
        assert_eq!(queue.pop_due(), Some(early_a));
        assert_eq!(queue.pop_due(), Some(early_b));
        assert_eq!(queue.pop_due(), Some(late));
        assert_eq!(queue.pop_due(), None);
        assert_eq!(queue.live_count(), 0);
    }

    #[test]
    fn test_interval_keeps_cadence() {
        let (source, mut queue) = queue();
        let id = queue.set_interval(1_000).unwrap();

        source.advance(StdDuration::from_millis(3_500));
        assert_eq!(queue.pop_due(), Some(id));
        assert_eq!(queue.pop_due(), Some(id));
        assert_eq!(queue.pop_due(), Some(id));
        assert_eq!(queue.pop_due(), None);
        assert_eq!(
            queue.next_deadline(),
            Some(start() + Duration::milliseconds(4_000))
        );
    }

    #[test]
    fn test_overflowing_delay_is_rejected() {
        let (_, mut queue) = queue();
        assert_eq!(
            queue.set_timeout(MAX_TIMEOUT_MS + 1),
            Err(Error::TimerOverflow {
                delay_ms: MAX_TIMEOUT_MS + 1
            })
        );
        assert!(queue.set_timeout(MAX_TIMEOUT_MS).is_ok());
    }

    #[test]
    fn test_far_target_arms_recheck() {
        let (_, mut queue) = queue();
        let mut timer = RoleTimer::new(TimerRole::Start);
        let target = start() + Duration::days(10);

        let delay = timer.arm(&mut queue, target).unwrap();
        assert!(delay < MAX_TIMEOUT_MS);
        assert_eq!(delay, 10 * DAY_MS as u64 - RECHECK_MARGIN_MS);
        assert!(matches!(timer.state(), TimerState::Recheck { target: t, .. } if t == target));
    }

    #[test]
    fn test_rearm_replaces_previous_timer() {
        let (_, mut queue) = queue();
        let mut timer = RoleTimer::new(TimerRole::Start);
        timer.arm(&mut queue, start() + Duration::hours(1)).unwrap();
        timer.arm(&mut queue, start() + Duration::hours(2)).unwrap();
        timer.repeat(&mut queue, 60_000).unwrap();
        assert_eq!(queue.live_count(), 1);
        assert!(timer.is_repeating());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (_, mut queue) = queue();
        let mut timer = RoleTimer::new(TimerRole::End);
        timer.arm_after(&mut queue, 500).unwrap();

        timer.cancel(&mut queue);
        timer.cancel(&mut queue);
        assert!(timer.is_idle());
        assert_eq!(queue.live_count(), 0);
    }

    #[test]
    fn test_fire_transitions() {
        let (source, mut queue) = queue();
        let mut once = RoleTimer::new(TimerRole::Once);
        let mut tick = RoleTimer::new(TimerRole::Interval);
        once.arm_after(&mut queue, 100).unwrap();
        tick.repeat(&mut queue, 100).unwrap();

        source.advance(StdDuration::from_millis(100));
        let first = queue.pop_due().unwrap();
        assert_eq!(tick.fire(first), None);
        assert!(matches!(once.fire(first), Some(Fired::Target(_))));
        assert!(once.is_idle());

        let second = queue.pop_due().unwrap();
        assert_eq!(tick.fire(second), Some(Fired::Tick));
        assert!(tick.is_repeating());
    }
}
