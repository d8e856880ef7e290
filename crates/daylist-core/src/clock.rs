use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::datetime::local_date;

/// Source of "now" and "today" for the engine.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(chrono_tz::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        local_date(Utc::now(), &self.tz)
    }
}

/// Manually driven clock. Clones share the same instant, so a test can keep
/// a handle and move time forward while the engine owns another.
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Rc<Cell<DateTime<Utc>>>,
    tz: Tz,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_timezone(now, chrono_tz::UTC)
    }

    pub fn with_timezone(now: DateTime<Utc>, tz: Tz) -> Self {
        Self {
            now: Rc::new(Cell::new(now)),
            tz,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn today(&self) -> NaiveDate {
        local_date(self.now.get(), &self.tz)
    }
}
