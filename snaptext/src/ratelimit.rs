//! Fixed-window request throttling.
//!
//! Process-local by design: counters live in memory and reset on restart,
//! which is an accepted limitation for single-instance deployments. Multi-
//! instance setups need an external limiter in front.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};

use crate::config::RateLimitConfig;

/// Result of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until the window resets, floored at 1 so a
    /// `Retry-After` header is never zero.
    pub fn retry_after_secs(&self, now: DateTime<Utc>) -> u64 {
        (self.reset_at - now).num_seconds().max(1) as u64
    }
}

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Fixed-window limiter keyed by client identity.
///
/// Constructed once per process and injected via `AppState` so tests can
/// substitute a fresh instance. The map is mutex-guarded; checks are a
/// single read-modify-write under the lock, so racing requests from the
/// same identity cannot lose updates.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    max_requests: u32,
    window: Duration,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl FixedWindowLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window: Duration::seconds(window_secs.max(1) as i64),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_requests, config.window_secs)
    }

    pub fn check(&self, identity: &str) -> RateLimitDecision {
        self.check_at(identity, Utc::now())
    }

    /// Expired windows are treated as fresh here regardless of sweep
    /// timing, so the sweep is purely advisory.
    fn check_at(&self, identity: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut entries = self.entries.lock().expect("rate limit map poisoned");

        let entry = entries.entry(identity.to_string()).or_insert(WindowEntry {
            count: 0,
            reset_at: now + self.window,
        });

        if entry.reset_at <= now {
            entry.count = 0;
            entry.reset_at = now + self.window;
        }

        if entry.count < self.max_requests {
            entry.count += 1;
            RateLimitDecision {
                allowed: true,
                remaining: self.max_requests - entry.count,
                reset_at: entry.reset_at,
            }
        } else {
            RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at: entry.reset_at,
            }
        }
    }

    /// Purge entries whose window already expired. Returns the number
    /// removed. Bounds memory growth; correctness never depends on it.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.entries.lock().expect("rate limit map poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.reset_at > now);
        before - entries.len()
    }

    #[cfg(test)]
    fn tracked_identities(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Resolve the client identity from forwarded-IP headers. Falls back to a
/// sentinel when the service fronts no proxy that sets them.
pub fn client_identity(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    "unknown".to_string()
}
