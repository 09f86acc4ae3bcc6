//! Wall-clock source for deadline arithmetic

use chrono::{DateTime, Utc};

/// Time provider injected into the engine so deadlines can be checked
/// against a controllable clock in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The host's real wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
