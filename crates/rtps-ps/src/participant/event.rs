// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic tasks of a participant on one timer thread.
//!
//! Events are held weakly: dropping the owner of an event cancels it.

use crate::history::lock_state;
use crate::writer::StatefulWriter;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Timer resolution.
const TICK: Duration = Duration::from_millis(10);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    Continue,
    Cancel,
}

/// A task run every `period()`.
pub trait TimedEvent: Send + Sync {
    fn name(&self) -> &str;

    /// Read before each rescheduling, so it may change at runtime.
    fn period(&self) -> Duration;

    fn on_event(&self) -> EventOutcome;
}

struct Scheduled {
    event: Weak<dyn TimedEvent>,
    due: Instant,
}

type Schedule = Arc<Mutex<Vec<Scheduled>>>;

/// Timer thread shared by every periodic task of a participant.
pub struct EventThread {
    schedule: Schedule,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl EventThread {
    pub fn start(name: &str) -> io::Result<Self> {
        let schedule: Schedule = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        let thread_schedule = schedule.clone();
        let thread_running = running.clone();
        let handle = thread::Builder::new()
            .name(format!("rtps-events-{}", name))
            .spawn(move || {
                while thread_running.load(Ordering::Relaxed) {
                    thread::sleep(TICK);
                    run_due(&thread_schedule);
                }
            })?;

        Ok(Self {
            schedule,
            running,
            handle: Some(handle),
        })
    }

    /// First run one period from now.
    pub fn schedule(&self, event: &Arc<dyn TimedEvent>) {
        let due = Instant::now() + event.period();
        self.push(event, due);
    }

    fn push(&self, event: &Arc<dyn TimedEvent>, due: Instant) {
        log::trace!("[EventThread] scheduling {}", event.name());
        lock_state(&self.schedule, "EventThread::schedule").push(Scheduled {
            event: Arc::downgrade(event),
            due,
        });
    }

    /// Move the next run of `event` to the next tick.
    pub fn restart(&self, event: &Arc<dyn TimedEvent>) {
        let target = Arc::downgrade(event);
        let mut schedule = lock_state(&self.schedule, "EventThread::restart");
        match schedule.iter_mut().find(|s| Weak::ptr_eq(&s.event, &target)) {
            Some(s) => s.due = Instant::now(),
            None => schedule.push(Scheduled {
                event: target,
                due: Instant::now(),
            }),
        }
    }

    pub fn scheduled_count(&self) -> usize {
        lock_state(&self.schedule, "EventThread::scheduled_count").len()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::debug!("[EventThread] timer thread panicked");
            }
        }
        lock_state(&self.schedule, "EventThread::stop").clear();
    }
}

impl Drop for EventThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run every due event outside the schedule lock, then reschedule.
fn run_due(schedule: &Schedule) {
    let now = Instant::now();
    let due: Vec<Arc<dyn TimedEvent>> = {
        let mut list = lock_state(schedule, "EventThread::run_due");
        list.retain(|s| s.event.strong_count() > 0);
        list.iter()
            .filter(|s| s.due <= now)
            .filter_map(|s| s.event.upgrade())
            .collect()
    };
    if due.is_empty() {
        return;
    }

    let mut cancelled = Vec::new();
    for event in &due {
        if event.on_event() == EventOutcome::Cancel {
            log::debug!("[EventThread] {} cancelled", event.name());
            cancelled.push(Arc::downgrade(event));
        }
    }

    let mut list = lock_state(schedule, "EventThread::run_due");
    let after = Instant::now();
    for event in &due {
        let weak = Arc::downgrade(event);
        if let Some(s) = list.iter_mut().find(|s| Weak::ptr_eq(&s.event, &weak)) {
            // A restart during the run already moved `due` forward.
            if s.due <= now {
                s.due = after + event.period();
            }
        }
    }
    list.retain(|s| !cancelled.iter().any(|c| Weak::ptr_eq(&s.event, c)));
}

/// Periodic HEARTBEAT of a reliable writer.
pub struct HeartbeatEvent {
    name: String,
    writer: Weak<StatefulWriter>,
}

impl HeartbeatEvent {
    pub fn new(writer: &Arc<StatefulWriter>) -> Self {
        Self {
            name: format!("heartbeat-{}", writer.core().guid()),
            writer: Arc::downgrade(writer),
        }
    }
}

impl TimedEvent for HeartbeatEvent {
    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> Duration {
        self.writer
            .upgrade()
            .and_then(|w| w.core().times().heartbeat_period.to_std())
            .unwrap_or(Duration::from_secs(3))
    }

    fn on_event(&self) -> EventOutcome {
        match self.writer.upgrade() {
            Some(w) => {
                w.send_heartbeat();
                EventOutcome::Continue
            }
            None => EventOutcome::Cancel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        period: Duration,
        runs: AtomicUsize,
        cancel_after: usize,
    }

    impl TimedEvent for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn period(&self) -> Duration {
            self.period
        }

        fn on_event(&self) -> EventOutcome {
            let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.cancel_after {
                EventOutcome::Cancel
            } else {
                EventOutcome::Continue
            }
        }
    }

    fn counting(period_ms: u64, cancel_after: usize) -> Arc<Counting> {
        Arc::new(Counting {
            period: Duration::from_millis(period_ms),
            runs: AtomicUsize::new(0),
            cancel_after,
        })
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_periodic_until_cancelled() {
        let events = EventThread::start("test").expect("start");
        let c = counting(20, 3);
        let dyn_c: Arc<dyn TimedEvent> = c.clone();
        events.schedule(&dyn_c);
        assert!(wait_until(|| events.scheduled_count() == 0));
        assert_eq!(c.runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dropped_event_is_forgotten() {
        let events = EventThread::start("test").expect("start");
        let dyn_c: Arc<dyn TimedEvent> = counting(10_000, 100);
        events.schedule(&dyn_c);
        assert_eq!(events.scheduled_count(), 1);
        drop(dyn_c);
        assert!(wait_until(|| events.scheduled_count() == 0));
    }

    #[test]
    fn test_restart_runs_immediately() {
        let events = EventThread::start("test").expect("start");
        let c = counting(60_000, 100);
        let dyn_c: Arc<dyn TimedEvent> = c.clone();
        events.schedule(&dyn_c);
        events.restart(&dyn_c);
        assert!(wait_until(|| c.runs.load(Ordering::SeqCst) == 1));
    }
}
