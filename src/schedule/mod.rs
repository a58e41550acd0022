//! Recurring schedules driven by resolved sun, moon, and clock times.
//!
//! ## Module Structure
//!
//! - [`spec`]: What a node is told to do (periodic, at a time, within a window)
//! - [`resolver`]: Turns time references into instants (the [`TimeResolver`] seam)
//! - [`delay`]: Pure delay arithmetic against the platform timer ceiling
//! - [`window`]: Window membership and year-wrapping date ranges
//! - [`timer`]: Timer platform, the host's timer queue, and per-role timers
//! - [`engine`]: The state machine that ties them together

pub mod delay;
pub mod engine;
pub mod resolver;
pub mod spec;
pub mod timer;
pub mod window;

pub use engine::{Action, EventKind, Phase, Schedule, ScheduleEngine};
pub use resolver::{AstroResolver, ResolvedTime, TimeResolver};
pub use spec::{
    DayFilter, DayParity, IntervalSpec, MoonEvent, ScheduleConfig, ScheduleSpec, TimeKind,
    TimeSpec, TimeUnit,
};
pub use timer::{RoleTimer, TimerId, TimerPlatform, TimerQueue, TimerRole, TimerState};
pub use window::{DateRange, MonthDay, RangeCheck};
