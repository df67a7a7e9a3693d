use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use dashmap::DashMap;

use crate::config::RateLimitConfig;

/// Per-client sliding-window request limiter.
///
/// Each key keeps the instants of its accepted requests inside the window; a
/// request is refused once the window already holds `max_requests` of them.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_requests: usize,
    window: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window: if window.is_zero() {
                Duration::from_secs(1)
            } else {
                window
            },
            hits: DashMap::new(),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window())
    }

    /// Record a request from `key`, returning `false` when it exceeds the budget.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut entry = self.hits.entry(key.to_owned()).or_default();
        let log = entry.value_mut();
        while log
            .front()
            .is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
        {
            log.pop_front();
        }
        if log.len() >= self.max_requests {
            return false;
        }
        log.push_back(now);
        true
    }

    /// Drop keys with no request inside the window.
    pub fn sweep(&self) {
        self.sweep_at(Instant::now());
    }

    fn sweep_at(&self, now: Instant) {
        self.hits.retain(|_, log| {
            log.back()
                .is_some_and(|latest| now.duration_since(*latest) < self.window)
        });
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.hits.len()
    }

    /// Length of the sliding window.
    pub fn window(&self) -> Duration {
        self.window
    }
}
