// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling-window rate limiter for outbound sends.
//!
//! Tracks send instants in a window; a dequeue is admitted only while fewer
//! than `max` sends happened in the window ending now. State lives in
//! memory: after a restart the window starts empty, which can briefly
//! exceed the provider budget. The provider answers that with a 429 the
//! retry path already absorbs.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling-window counter. Callers pass `now` explicitly so tests can step
/// time without sleeping.
#[derive(Debug)]
pub struct RateLimiter {
    max: usize,
    window: Duration,
    sends: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max: max as usize,
            window,
            sends: VecDeque::new(),
        }
    }

    /// Whether a send is admissible at `now`. Returns the wait until the
    /// oldest tracked send leaves the window when the budget is spent.
    pub fn check(&mut self, now: Instant) -> Option<Duration> {
        self.evict(now);
        if self.sends.len() < self.max {
            None
        } else {
            let oldest = *self.sends.front().expect("len >= max >= 1");
            Some((oldest + self.window).saturating_duration_since(now))
        }
    }

    /// Record a send at `now`. Call only after [`check`] admitted it.
    pub fn record(&mut self, now: Instant) {
        self.sends.push_back(now);
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.sends.front() {
            if now.saturating_duration_since(*oldest) >= self.window {
                self.sends.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_max_within_window() {
        let mut limiter = RateLimiter::new(3, Duration::from_secs(60));
        let now = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check(now).is_none());
            limiter.record(now);
        }
        let wait = limiter.check(now).expect("budget spent");
        assert_eq!(wait, Duration::from_secs(60));
    }

    #[test]
    fn window_frees_capacity_as_sends_age_out() {
        let mut limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        limiter.record(start);
        limiter.record(start + Duration::from_secs(30));

        assert!(limiter.check(start + Duration::from_secs(59)).is_some());
        // First send aged out at +60: one slot free.
        assert!(limiter.check(start + Duration::from_secs(60)).is_none());
        limiter.record(start + Duration::from_secs(60));
        assert!(limiter.check(start + Duration::from_secs(60)).is_some());
    }

    #[test]
    fn wait_shrinks_as_the_window_slides() {
        let mut limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();
        limiter.record(start);

        let wait = limiter.check(start + Duration::from_secs(45)).unwrap();
        assert_eq!(wait, Duration::from_secs(15));
    }
}
