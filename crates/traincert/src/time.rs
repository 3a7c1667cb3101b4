//! Time utilities for traincert.
//!
//! All persisted timestamps are RFC 3339 strings in UTC. Operations that
//! depend on "now" take a [`Clock`] so tests can move time forward.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Months, Utc};

use crate::error::{Result, TrainError};

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Set the current time.
    pub fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        if let Ok(mut now) = self.now.lock() {
            *now += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Format a timestamp for storage.
pub fn to_rfc3339(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Parse a stored timestamp.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| TrainError::Serialization(format!("invalid timestamp '{s}': {e}")))
}

/// Add whole calendar years, clamping Feb 29 to Feb 28 when needed.
pub fn add_years(at: DateTime<Utc>, years: u32) -> Result<DateTime<Utc>> {
    at.checked_add_months(Months::new(years * 12))
        .ok_or_else(|| TrainError::InvalidInput(format!("cannot add {years} years to {at}")))
}
