use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;

/// A source of instants used to time trials and stamp comparison records
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock, in UTC
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Every call to `now` returns the
/// current instant and then advances it by `step`, which makes trial
/// durations deterministic in tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    step: chrono::Duration,
}

impl ManualClock {
    /// A clock frozen at `start`
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::ticking(start, Duration::from_secs(0))
    }

    /// A clock starting at `start` that advances by `step` on every read
    pub fn ticking(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            now: Mutex::new(start),
            step: chrono::Duration::from_std(step).unwrap_or_else(|_| chrono::Duration::zero()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = *now + by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let current = *now;
        *now = current + self.step;
        current
    }
}

/// Time between two readings of a clock. A clock that went backwards yields
/// zero rather than a negative span.
pub fn elapsed(start: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
    (end - start).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(0, 0).unwrap()
    }

    #[test]
    fn ticking_clock_advances_on_every_read() {
        let clock = ManualClock::ticking(epoch(), Duration::from_millis(5));

        let first = clock.now();
        let second = clock.now();

        assert_eq!(first, epoch());
        assert_eq!(elapsed(first, second), Duration::from_millis(5));
    }

    #[test]
    fn frozen_clock_measures_zero() {
        let clock = ManualClock::new(epoch());
        assert_eq!(elapsed(clock.now(), clock.now()), Duration::from_secs(0));
    }

    #[test]
    fn backwards_clock_is_clamped_to_zero() {
        let clock = ManualClock::new(epoch());
        clock.advance(Duration::from_secs(10));
        let later = clock.now();
        clock.set(epoch());
        let earlier = clock.now();

        assert_eq!(elapsed(later, earlier), Duration::from_secs(0));
    }
}
