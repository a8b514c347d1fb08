//! Single-threaded timer queue driven by a virtual monotonic clock.
//!
//! The host advances the clock; due tasks are popped in deadline order and
//! handed back to the caller for execution. Ties fire in scheduling order.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
pub struct Scheduler<T> {
    now: Duration,
    next_id: u64,
    queue: BTreeMap<(Duration, u64), T>,
    deadlines: HashMap<u64, Duration>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            now: Duration::ZERO,
            next_id: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn schedule(&mut self, delay: Duration, task: T) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        let deadline = self.now + delay;
        self.queue.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        TimerId(id)
    }

    /// Cancels a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id.0) {
            Some(deadline) => self.queue.remove(&(deadline, id.0)).is_some(),
            None => false,
        }
    }

    /// Drops every pending timer and returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        self.deadlines.clear();
        count
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id.0)
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Pops the earliest task due at or before `until`, moving the clock to
    /// its deadline.
    pub fn pop_due(&mut self, until: Duration) -> Option<(TimerId, T)> {
        let key = *self.queue.keys().next()?;
        if key.0 > until {
            return None;
        }
        let task = self.queue.remove(&key)?;
        self.deadlines.remove(&key.1);
        if key.0 > self.now {
            self.now = key.0;
        }
        Some((TimerId(key.1), task))
    }

    /// Moves the clock forward to `until` once every due task was drained.
    pub fn settle(&mut self, until: Duration) {
        if until > self.now {
            self.now = until;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(scheduler: &mut Scheduler<&'static str>, until: Duration) -> Vec<&'static str> {
        let mut fired = Vec::new();
        while let Some((_, task)) = scheduler.pop_due(until) {
            fired.push(task);
        }
        scheduler.settle(until);
        fired
    }

    #[test]
    fn test_tasks_fire_in_deadline_then_schedule_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_millis(500), "late");
        scheduler.schedule(Duration::from_millis(100), "first");
        scheduler.schedule(Duration::from_millis(100), "second");

        assert_eq!(drain(&mut scheduler, Duration::from_millis(99)), Vec::<&str>::new());
        assert_eq!(
            drain(&mut scheduler, Duration::from_millis(600)),
            vec!["first", "second", "late"]
        );
        assert_eq!(scheduler.now(), Duration::from_millis(600));
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule(Duration::from_secs(1), "cancelled");
        scheduler.schedule(Duration::from_secs(2), "kept");

        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(!scheduler.is_pending(id));
        assert_eq!(drain(&mut scheduler, Duration::from_secs(5)), vec!["kept"]);
    }

    #[test]
    fn test_cancel_all_clears_queue() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(Duration::from_secs(1), "a");
        scheduler.schedule(Duration::from_secs(1), "b");
        assert_eq!(scheduler.cancel_all(), 2);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn test_delay_is_relative_to_current_time() {
        let mut scheduler = Scheduler::new();
        scheduler.settle(Duration::from_secs(3));
        scheduler.schedule(Duration::from_secs(1), "a");
        assert_eq!(scheduler.next_deadline(), Some(Duration::from_secs(4)));
    }
}
