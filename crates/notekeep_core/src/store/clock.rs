//! Strictly increasing logical clock.

use crate::model::note::Timestamp;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Commit-time source for in-process stores.
///
/// Each tick returns `max(wall_ms, last + 1)`, so values never repeat even
/// when several commits land in the same millisecond or the wall clock steps
/// backwards.
#[derive(Debug)]
pub struct LogicalClock {
    last: AtomicI64,
    follow_wall_clock: bool,
}

impl LogicalClock {
    /// Clock tracking wall-clock milliseconds.
    pub fn new() -> Self {
        Self {
            last: AtomicI64::new(0),
            follow_wall_clock: true,
        }
    }

    /// Pure counter clock; the first tick returns `start + 1`.
    pub fn manual(start: Timestamp) -> Self {
        Self {
            last: AtomicI64::new(start),
            follow_wall_clock: false,
        }
    }

    /// Advances the clock and returns the new commit time.
    pub fn tick(&self) -> Timestamp {
        let wall = if self.follow_wall_clock {
            Utc::now().timestamp_millis()
        } else {
            Timestamp::MIN
        };
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(last.saturating_add(1).max(wall))
            })
            .unwrap_or_else(|current| current);
        previous.saturating_add(1).max(wall)
    }

    /// Returns the last issued commit time without advancing.
    pub fn last(&self) -> Timestamp {
        self.last.load(Ordering::SeqCst)
    }
}

impl Default for LogicalClock {
    fn default() -> Self {
        Self::new()
    }
}
