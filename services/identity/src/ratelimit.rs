//! In-memory sliding-window rate limiting for the sensitive auth flows.
//!
//! Counters are process-local by design: a restart clears all throttling
//! state, which is acceptable for these limits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;

/// Outcome of a limiter check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub limited: bool,
    /// Seconds until the oldest in-window request falls out and a retry
    /// can succeed. Zero when not limited.
    pub retry_after_secs: u64,
}

/// Sliding-window counter keyed by identifier or IP.
///
/// Each key holds the timestamps of its requests inside the trailing
/// window; a key is limited once that count reaches `max_requests`.
/// Entries are evicted lazily: per-key on every check, and wholesale for
/// keys idle past the window, so memory stays bounded. One coarse mutex
/// serializes checks, which is fine at O(window size) per operation.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window: Duration::seconds(window_secs),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Login family: 10 requests per minute per identifier.
    pub fn login(clock: Arc<dyn Clock>) -> Self {
        Self::new(10, 60, clock)
    }

    /// Registration family: 10 requests per minute per client IP.
    pub fn registration(clock: Arc<dyn Clock>) -> Self {
        Self::new(10, 60, clock)
    }

    /// Password-reset family: 10 requests per minute per email.
    pub fn password_reset(clock: Arc<dyn Clock>) -> Self {
        Self::new(10, 60, clock)
    }

    /// Code-issuance throttle: one code per minute per identifier,
    /// preventing code spam independently of the endpoint family limits.
    pub fn otp_issue(clock: Arc<dyn Clock>) -> Self {
        Self::new(1, 60, clock)
    }

    /// Analytics family: 30 requests per minute per client IP. Consumed
    /// by the host's analytics endpoints; a separate instance so load
    /// there cannot starve the auth flows.
    pub fn analytics(clock: Arc<dyn Clock>) -> Self {
        Self::new(30, 60, clock)
    }

    /// Check whether `key` is limited. A non-limited check records the
    /// current timestamp against the key.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();

        // Whole-key eviction: drop keys whose newest request left the window.
        entries.retain(|_, stamps| stamps.last().is_some_and(|t| now - *t < self.window));

        let stamps = entries.entry(key.to_owned()).or_default();
        stamps.retain(|t| now - *t < self.window);

        if stamps.len() >= self.max_requests {
            let oldest = stamps[0];
            let wait = self.window - (now - oldest);
            return RateLimitDecision {
                limited: true,
                retry_after_secs: wait.num_seconds().max(0) as u64,
            };
        }

        stamps.push(now);
        RateLimitDecision {
            limited: false,
            retry_after_secs: 0,
        }
    }
}
