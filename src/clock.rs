// =============================================================================
// Injectable time source
// =============================================================================
//
// Daily-counter resets and hold-time limits hinge on the UTC calendar date,
// so components that care about "now" take a `Clock` instead of calling
// `Utc::now()` directly. Tests pin time with `FixedClock`.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Deterministic clock for tests. The instant can be advanced explicitly.
pub struct FixedClock {
    now: parking_lot::RwLock<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: parking_lot::RwLock::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write() = now;
    }

    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.write();
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now_utc(), start);

        clock.advance(chrono::Duration::hours(13));
        assert_eq!(clock.now_utc().date_naive(), start.date_naive() + chrono::Duration::days(1));
    }
}
