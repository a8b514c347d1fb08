//! Load and retry guards for the adaptive path.
//!
//! The native path has neither guard: a progressive source that stalls stays
//! stalled until the user picks a station again.

use std::time::Duration;

use tracing::{debug, warn};

use crate::capabilities::ReadyState;
use crate::errors::PlaybackError;
use crate::scheduler::{Scheduler, TimerId};

#[derive(Debug)]
pub struct FailureWatchdog {
    load_timeout: Duration,
    max_retries: u32,
    retry_count: u32,
    load_timer: Option<TimerId>,
}

impl FailureWatchdog {
    pub fn new(load_timeout: Duration, max_retries: u32) -> Self {
        Self {
            load_timeout,
            max_retries: max_retries.max(1),
            retry_count: 0,
            load_timer: None,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn is_armed(&self) -> bool {
        self.load_timer.is_some()
    }

    /// Starts the load watchdog. `task` fires after the load timeout unless
    /// [`FailureWatchdog::on_metadata_loaded`] runs first.
    pub fn arm<T>(&mut self, scheduler: &mut Scheduler<T>, task: T) {
        self.disarm(scheduler);
        self.load_timer = Some(scheduler.schedule(self.load_timeout, task));
        debug!(timeout_ms = self.load_timeout.as_millis() as u64, "Load watchdog armed");
    }

    pub fn disarm<T>(&mut self, scheduler: &mut Scheduler<T>) {
        if let Some(timer) = self.load_timer.take() {
            scheduler.cancel(timer);
        }
    }

    /// Success path: clears the pending timer and the retry budget.
    pub fn on_metadata_loaded<T>(&mut self, scheduler: &mut Scheduler<T>) {
        self.disarm(scheduler);
        self.retry_count = 0;
    }

    /// Called when the load timer fires.
    ///
    /// Returns the error to surface, if the stream is still unusable and the
    /// user still wants it playing.
    pub fn on_load_timeout(
        &mut self,
        ready_state: ReadyState,
        should_play: bool,
    ) -> Option<PlaybackError> {
        self.load_timer = None;
        if ready_state.has_usable_data() || !should_play {
            debug!(?ready_state, should_play, "Load watchdog expired harmlessly");
            return None;
        }
        warn!(?ready_state, "Stream did not become playable in time");
        Some(PlaybackError::Connection)
    }

    /// Counts one playlist retry. Returns the error exactly when the budget
    /// is exhausted.
    pub fn on_retry(&mut self) -> Option<PlaybackError> {
        self.retry_count += 1;
        debug!(retry = self.retry_count, max = self.max_retries, "Engine retrying playlist");
        if self.retry_count == self.max_retries {
            warn!(retries = self.retry_count, "Retry budget exhausted");
            return Some(PlaybackError::PersistentLoad);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_timeout_only_reports_when_needed() {
        let mut watchdog = FailureWatchdog::new(Duration::from_secs(10), 3);
        assert_eq!(
            watchdog.on_load_timeout(ReadyState::HaveMetadata, true),
            Some(PlaybackError::Connection)
        );
        assert_eq!(watchdog.on_load_timeout(ReadyState::HaveNothing, false), None);
        assert_eq!(watchdog.on_load_timeout(ReadyState::HaveEnoughData, true), None);
    }

    #[test]
    fn test_retry_budget() {
        let mut watchdog = FailureWatchdog::new(Duration::from_secs(10), 3);
        assert_eq!(watchdog.on_retry(), None);
        assert_eq!(watchdog.on_retry(), None);
        assert_eq!(watchdog.on_retry(), Some(PlaybackError::PersistentLoad));
        assert_eq!(watchdog.on_retry(), None);
    }

    #[test]
    fn test_success_resets_budget_and_timer() {
        let mut scheduler: Scheduler<&str> = Scheduler::new();
        let mut watchdog = FailureWatchdog::new(Duration::from_secs(10), 3);
        watchdog.arm(&mut scheduler, "timeout");
        watchdog.on_retry();
        watchdog.on_retry();
        assert!(watchdog.is_armed());

        watchdog.on_metadata_loaded(&mut scheduler);
        assert!(!watchdog.is_armed());
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(watchdog.retry_count(), 0);
        assert_eq!(watchdog.on_retry(), None);
    }
}
