//! Single-threaded host loop for interval nodes.
//!
//! The runtime owns the timer queue and every node. Timer callbacks are
//! serialized: a due id is routed to the node that owns it, and whatever that
//! node re-arms is in the queue before the next id is popped.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use super::IntervalNode;
use crate::common::constants::RUNTIME_POLL_MS;
use crate::schedule::{ScheduleConfig, TimerPlatform, TimerQueue};
use crate::signals::{SignalMessage, SignalState};
use crate::time::TimeSource;

/// Produces fresh node schedules on a reload request.
pub type Reloader = Box<dyn FnMut() -> Result<Vec<(String, ScheduleConfig)>>>;

pub struct Runtime {
    source: Arc<dyn TimeSource>,
    queue: TimerQueue,
    nodes: Vec<IntervalNode>,
    reloader: Option<Reloader>,
}

impl Runtime {
    pub fn new(source: Arc<dyn TimeSource>) -> Self {
        Self {
            queue: TimerQueue::new(source.clone()),
            source,
            nodes: Vec::new(),
            reloader: None,
        }
    }

    pub fn with_reloader(mut self, reloader: Reloader) -> Self {
        self.reloader = Some(reloader);
        self
    }

    pub fn add_node(&mut self, node: IntervalNode) -> Result<()> {
        if self.node(node.name()).is_some() {
            bail!("duplicate node name '{}'", node.name());
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn node(&self, name: &str) -> Option<&IntervalNode> {
        self.nodes.iter().find(|n| n.name() == name)
    }

    pub fn nodes(&self) -> &[IntervalNode] {
        &self.nodes
    }

    pub fn live_timers(&self) -> usize {
        self.queue.live_count()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.source.now()
    }

    /// Arm every node.
    pub fn start(&mut self) {
        for node in &mut self.nodes {
            node.start(&mut self.queue);
        }
    }

    /// Fire every timer that is due now. Returns how many fired.
    pub fn dispatch_due(&mut self) -> usize {
        let mut fired = 0;
        while let Some(id) = self.queue.pop_due() {
            fired += 1;
            let handled = self
                .nodes
                .iter_mut()
                .any(|node| node.on_timer(id, &mut self.queue));
            if !handled {
                log_debug!("Timer {} has no owner, clearing it", id);
                self.queue.clear(id);
            }
        }
        fired
    }

    /// Advance through every deadline up to and including `end`.
    pub fn run_until(&mut self, end: DateTime<Utc>) -> usize {
        let mut fired = self.dispatch_due();
        while let Some(deadline) = self.queue.next_deadline().filter(|d| *d <= end) {
            self.sleep_until(deadline);
            if self.source.now() < deadline {
                // Simulation ended before the deadline
                break;
            }
            fired += self.dispatch_due();
        }
        self.sleep_until(end);
        fired
    }

    /// Run until a shutdown signal arrives or a simulated clock runs out.
    pub fn run(&mut self, signals: &SignalState) -> Result<()> {
        while signals.is_running() {
            while let Ok(message) = signals.receiver.try_recv() {
                match message {
                    SignalMessage::Shutdown => break,
                    SignalMessage::Trigger => self.trigger_all(),
                    SignalMessage::Reload => self.reload()?,
                }
            }
            if !signals.is_running() {
                break;
            }

            self.dispatch_due();
            if self.source.is_ended() {
                log_decorated!("Simulation reached its end");
                break;
            }

            let now = self.source.now();
            let poll = StdDuration::from_millis(RUNTIME_POLL_MS);
            let wait = self
                .queue
                .next_deadline()
                .and_then(|deadline| (deadline - now).to_std().ok())
                .map_or(poll, |until| until.min(poll));
            self.source.sleep(wait);
        }
        self.shutdown();
        Ok(())
    }

    /// Manual input to one node.
    pub fn trigger(&mut self, name: &str) -> Result<()> {
        let Some(node) = self.nodes.iter_mut().find(|n| n.name() == name) else {
            bail!("no node named '{name}'");
        };
        node.trigger(&self.queue);
        Ok(())
    }

    pub fn trigger_all(&mut self) {
        for node in &mut self.nodes {
            node.trigger(&self.queue);
        }
    }

    /// Re-read schedules and reconfigure the nodes they name.
    pub fn reload(&mut self) -> Result<()> {
        let Some(reloader) = self.reloader.as_mut() else {
            log_warning!("Reload requested but no configuration source is attached");
            return Ok(());
        };
        let configs = match reloader() {
            Ok(configs) => configs,
            Err(e) => {
                log_error!("Reload failed, keeping current schedules: {}", e);
                return Ok(());
            }
        };

        for (name, config) in configs {
            match self.nodes.iter_mut().find(|n| n.name() == name) {
                Some(node) => node.reconfigure(config, &mut self.queue),
                None => log_warning!("Node '{}' is new; restart to add it", name),
            }
        }
        Ok(())
    }

    /// Close every node. No timer fires afterwards.
    pub fn shutdown(&mut self) {
        for node in &mut self.nodes {
            node.close(&mut self.queue);
        }
    }

    fn sleep_until(&self, instant: DateTime<Utc>) {
        if let Ok(wait) = (instant - self.source.now()).to_std() {
            self.source.sleep(wait);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astro::{AstroCache, DayBoundary, GeoCoordinate};
    use crate::node::{LogStatusSink, ScheduledEvent};
    use crate::schedule::{AstroResolver, IntervalSpec, ScheduleSpec, TimeUnit};
    use crate::schedule::{EventKind, TimeResolver};
    use crate::time::SimulatedTimeSource;
    use chrono::{Duration, TimeZone};
    use std::sync::Mutex;

    type Events = Arc<Mutex<Vec<ScheduledEvent>>>;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    fn resolver() -> Arc<dyn TimeResolver> {
        Arc::new(AstroResolver::new(
            GeoCoordinate::new(52.52, 13.405).unwrap(),
            DayBoundary::Utc,
            Arc::new(AstroCache::default()),
        ))
    }

    fn periodic(name: &str, minutes: f64, events: &Events) -> IntervalNode {
        let sink = events.clone();
        IntervalNode::new(
            name,
            ScheduleConfig::new(ScheduleSpec::Periodic(IntervalSpec::new(
                minutes,
                TimeUnit::Minutes,
            ))),
            resolver(),
            DayBoundary::Utc,
            Box::new(LogStatusSink::new(name)),
            Box::new(move |event: ScheduledEvent| sink.lock().unwrap().push(event)),
        )
    }

    fn runtime() -> Runtime {
        crate::logger::Log::set_enabled(false);
        Runtime::new(Arc::new(SimulatedTimeSource::fast_forward(
            t0(),
            t0() + Duration::days(2),
        )))
    }

    #[test]
    fn test_nodes_fire_in_deadline_order() {
        let events: Events = Arc::default();
        let mut rt = runtime();
        rt.add_node(periodic("slow", 25.0, &events)).unwrap();
        rt.add_node(periodic("fast", 10.0, &events)).unwrap();
        rt.start();

        rt.run_until(t0() + Duration::minutes(50));
        let order: Vec<_> = events
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.node.clone(), e.time_data.now))
            .collect();
        let at = |m| t0() + Duration::minutes(m);
        assert_eq!(
            order,
            vec![
                ("fast".to_string(), at(10)),
                ("fast".to_string(), at(20)),
                ("slow".to_string(), at(25)),
                ("fast".to_string(), at(30)),
                ("fast".to_string(), at(40)),
                ("slow".to_string(), at(50)),
                ("fast".to_string(), at(50)),
            ]
        );
        assert_eq!(rt.now(), at(50));
    }

    #[test]
    fn test_duplicate_node_names_are_rejected() {
        let events: Events = Arc::default();
        let mut rt = runtime();
        rt.add_node(periodic("porch", 5.0, &events)).unwrap();
        assert!(rt.add_node(periodic("porch", 10.0, &events)).is_err());
    }

    #[test]
    fn test_trigger_unknown_node_fails() {
        let events: Events = Arc::default();
        let mut rt = runtime();
        rt.add_node(periodic("porch", 5.0, &events)).unwrap();
        rt.start();
        assert!(rt.trigger("garage").is_err());
        rt.trigger("porch").unwrap();
        assert_eq!(events.lock().unwrap()[0].kind, EventKind::Manual);
    }

    #[test]
    fn test_shutdown_stops_everything() {
        let events: Events = Arc::default();
        let mut rt = runtime();
        rt.add_node(periodic("a", 5.0, &events)).unwrap();
        rt.add_node(periodic("b", 7.0, &events)).unwrap();
        rt.start();
        assert_eq!(rt.live_timers(), 2);

        rt.shutdown();
        assert_eq!(rt.live_timers(), 0);
        assert_eq!(rt.run_until(t0() + Duration::hours(3)), 0);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_reload_reconfigures_existing_nodes() {
        let events: Events = Arc::default();
        let mut rt = runtime().with_reloader(Box::new(|| {
            Ok(vec![(
                "porch".to_string(),
                ScheduleConfig::new(ScheduleSpec::Periodic(IntervalSpec::new(
                    1.0,
                    TimeUnit::Hours,
                ))),
            )])
        }));
        rt.add_node(periodic("porch", 5.0, &events)).unwrap();
        rt.start();
        rt.reload().unwrap();

        rt.run_until(t0() + Duration::minutes(59));
        assert!(events.lock().unwrap().is_empty());
        rt.run_until(t0() + Duration::minutes(60));
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_run_stops_when_signalled() {
        let events: Events = Arc::default();
        let mut rt = runtime();
        rt.add_node(periodic("porch", 5.0, &events)).unwrap();
        rt.start();

        let (signals, sender) = SignalState::detached();
        sender.send(SignalMessage::Trigger).unwrap();
        signals
            .running
            .store(false, std::sync::atomic::Ordering::SeqCst);
        rt.run(&signals).unwrap();

        assert_eq!(rt.live_timers(), 0);
    }

    #[test]
    fn test_run_ends_with_simulation() {
        let events: Events = Arc::default();
        let mut rt = runtime();
        rt.add_node(periodic("porch", 60.0, &events)).unwrap();
        rt.start();

        let (signals, sender) = SignalState::detached();
        sender.send(SignalMessage::Trigger).unwrap();
        rt.run(&signals).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events[0].kind, EventKind::Manual);
        // Two simulated days of hourly ticks
        assert_eq!(events.iter().filter(|e| e.kind == EventKind::Interval).count(), 48);
        assert_eq!(rt.live_timers(), 0);
    }
}
