//! Strictly increasing timestamps.
//!
//! `generatedAt` must order reports by insertion and storage keys must never
//! collide, so wall-clock readings that would repeat or go backwards are
//! bumped past the previous value.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

#[derive(Debug, Default)]
pub struct MonotonicClock {
    last_micros: AtomicI64,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes after a previously issued instant (e.g. the newest stored row).
    pub fn starting_after(instant: DateTime<Utc>) -> Self {
        Self {
            last_micros: AtomicI64::new(instant.timestamp_micros()),
        }
    }

    /// Next instant, always later than any instant this clock returned before.
    pub fn now(&self) -> DateTime<Utc> {
        let micros = self.next_micros();
        DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
    }

    /// Next value in milliseconds; distinct across calls.
    pub fn now_millis(&self) -> i64 {
        let mut prev = self.last_micros.load(Ordering::Acquire);
        loop {
            let next_ms = Utc::now()
                .timestamp_millis()
                .max(prev.div_euclid(1_000) + 1);
            let next = next_ms * 1_000;
            match self
                .last_micros
                .compare_exchange(prev, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next / 1_000,
                Err(actual) => prev = actual,
            }
        }
    }

    fn next_micros(&self) -> i64 {
        let mut prev = self.last_micros.load(Ordering::Acquire);
        loop {
            let next = Utc::now().timestamp_micros().max(prev + 1);
            match self
                .last_micros
                .compare_exchange(prev, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instants_strictly_increase() {
        let clock = MonotonicClock::new();
        let mut last = clock.now();
        for _ in 0..1_000 {
            let next = clock.now();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn millis_never_repeat() {
        let clock = MonotonicClock::new();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            assert!(seen.insert(clock.now_millis()));
        }
    }

    #[test]
    fn resumes_after_given_instant() {
        let future = Utc::now() + chrono::Duration::hours(1);
        let clock = MonotonicClock::starting_after(future);
        assert!(clock.now() > future);
    }
}
