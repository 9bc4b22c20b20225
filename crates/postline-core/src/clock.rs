//! Time source used to stamp records and compute retry deadlines.

use chrono::{DateTime, Utc};

/// Supplies the current time. Implementations must be `Send + Sync`.
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
