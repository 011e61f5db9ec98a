//! Time source for cache freshness and status timestamps
//!
//! `SystemClock` reads `chrono::Utc::now()`; tests drive `MockClock` by hand
//! to step across the freshness window without sleeping.

use chrono::{DateTime, Utc};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time elapsed from `earlier` to `now`
///
/// `None` when `earlier` lies in the future, i.e. the wall clock stepped back.
pub fn elapsed_between(earlier: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    (now - earlier).to_std().ok()
}

#[cfg(test)]
#[allow(clippy::expect_used)]
pub struct MockClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).expect("advance out of range");
        *self.now.lock().expect("MockClock lock poisoned") += by;
    }

    pub fn rewind(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).expect("rewind out of range");
        *self.now.lock().expect("MockClock lock poisoned") -= by;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("MockClock lock poisoned")
    }
}
