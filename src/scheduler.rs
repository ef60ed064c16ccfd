//! Deadline table for the interactive thread.
//!
//! Nothing here runs on its own: the event loop asks for [`Scheduler::due`]
//! timers and dispatches them one after another. Periodic timers are
//! rescheduled by their handler.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Track-finished polling and info refresh.
    Poll,
    /// Clears expired status and error lines.
    StatusReset,
    /// Writes the playlist file while sequential playlist mode is on.
    PlaylistAutoExport,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    deadlines: HashMap<Timer, Instant>,
}

impl Scheduler {
    /// Arms `timer`, replacing any deadline it already had.
    pub fn schedule(&mut self, timer: Timer, after: Duration, now: Instant) {
        debug!(?timer, ?after, "timer armed");
        self.deadlines.insert(timer, now + after);
    }

    pub fn schedule_at(&mut self, timer: Timer, deadline: Instant) {
        self.deadlines.insert(timer, deadline);
    }

    pub fn cancel(&mut self, timer: Timer) -> bool {
        let removed = self.deadlines.remove(&timer).is_some();
        if removed {
            debug!(?timer, "timer cancelled");
        }
        removed
    }

    pub fn cancel_all(&mut self) {
        self.deadlines.clear();
    }

    pub fn is_scheduled(&self, timer: Timer) -> bool {
        self.deadlines.contains_key(&timer)
    }

    pub fn deadline(&self, timer: Timer) -> Option<Instant> {
        self.deadlines.get(&timer).copied()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Removes and returns every timer whose deadline has passed, earliest first.
    pub fn due(&mut self, now: Instant) -> Vec<Timer> {
        let mut fired: Vec<(Instant, Timer)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(timer, deadline)| (*deadline, *timer))
            .collect();
        fired.sort_by_key(|(deadline, _)| *deadline);

        for (_, timer) in &fired {
            self.deadlines.remove(timer);
        }
        fired.into_iter().map(|(_, timer)| timer).collect()
    }
}
