//! Debounced write scheduling.
//!
//! A single re-armable deadline. Every mutation re-arms it, so a burst of
//! mutations yields one write, timed from the last mutation.

use chrono::{DateTime, Duration, Utc};

/// Quiet-window debouncer with one pending deadline.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet: Duration,
    deadline: Option<DateTime<Utc>>,
}

impl Debouncer {
    /// Debouncer with a quiet window of `quiet_ms` milliseconds.
    #[must_use]
    pub fn new(quiet_ms: u32) -> Self {
        Self {
            quiet: Duration::milliseconds(i64::from(quiet_ms)),
            deadline: None,
        }
    }

    /// Arm the deadline at `now + quiet`, replacing any pending one.
    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.deadline = Some(now + self.quiet);
    }

    /// Drop the pending deadline. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Pending deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Consume the deadline if it has passed at `now`.
    ///
    /// Returns `true` exactly once per armed deadline.
    pub fn fire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
