//! Time source for the engine.
//!
//! Everything time-dependent (SLA flags, reopen windows, audit stamps)
//! reads through [`Clock`], so tests drive a [`ManualClock`] instead of
//! sleeping.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock tests move by hand.
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    ///
    /// # Panics
    ///
    /// Panics when the internal lock is poisoned, which only happens after
    /// a panic on another test thread.
    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock().expect("clock lock poisoned");
        *current += by;
    }

    /// Jump the clock to an absolute instant.
    ///
    /// # Panics
    ///
    /// Panics when the internal lock is poisoned.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.current.lock().expect("clock lock poisoned") = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock().expect("clock lock poisoned")
    }
}
