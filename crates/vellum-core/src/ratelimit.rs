//! Sliding-window rate limiting.
//!
//! Each identifier (client IP) gets a window of admission timestamps;
//! entries older than the window are pruned before every decision. A
//! rejected request is *not* recorded, so hammering a full window does not
//! push the reset time further out.
//!
//! Limiter state is process-local. Running multiple instances gives each
//! its own windows; that is an accepted deployment limitation, not a bug.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Outcome of a rate-limit check, with everything needed for the
/// `X-RateLimit-*` and `Retry-After` response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: usize,
    pub remaining: usize,
    /// Epoch milliseconds at which the window next has room.
    pub reset_at_ms: i64,
    /// Whole seconds a rejected client should wait, at least 1.
    pub retry_after_secs: u64,
}

/// Per-identifier sliding-window limiter.
pub struct RateLimiter {
    windows: DashMap<String, Vec<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Check and, if admitted, record a request for `id`.
    pub fn check(&self, id: &str) -> Decision {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window);

        let mut entry = self.windows.entry(id.to_string()).or_default();
        let timestamps = entry.value_mut();
        if let Some(cutoff) = cutoff {
            timestamps.retain(|t| *t >= cutoff);
        }

        if timestamps.len() >= self.max_requests {
            let oldest = timestamps.first().copied().unwrap_or(now);
            let until_reset = (oldest + self.window).saturating_duration_since(now);
            return Decision {
                allowed: false,
                limit: self.max_requests,
                remaining: 0,
                reset_at_ms: epoch_ms_after(until_reset),
                retry_after_secs: until_reset.as_secs().max(1),
            };
        }

        timestamps.push(now);
        let oldest = timestamps.first().copied().unwrap_or(now);
        let until_reset = (oldest + self.window).saturating_duration_since(now);
        Decision {
            allowed: true,
            limit: self.max_requests,
            remaining: self.max_requests - timestamps.len(),
            reset_at_ms: epoch_ms_after(until_reset),
            retry_after_secs: 0,
        }
    }

    /// Requests still available to `id` without recording anything.
    pub fn remaining(&self, id: &str) -> usize {
        let count = self.valid_count(id);
        self.max_requests.saturating_sub(count)
    }

    /// Epoch milliseconds when the oldest in-window request expires, or 0
    /// when nothing is recorded.
    pub fn reset_at_ms(&self, id: &str) -> i64 {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window);
        match self.windows.get(id) {
            None => 0,
            Some(entry) => {
                let oldest = entry
                    .iter()
                    .copied()
                    .filter(|t| cutoff.is_none_or(|c| *t >= c))
                    .min();
                match oldest {
                    None => 0,
                    Some(oldest) => {
                        epoch_ms_after((oldest + self.window).saturating_duration_since(now))
                    }
                }
            }
        }
    }

    /// Drop identifiers whose windows are entirely stale.
    pub fn sweep(&self) {
        let now = Instant::now();
        let Some(cutoff) = now.checked_sub(self.window) else {
            return;
        };
        self.windows.retain(|_, timestamps| {
            timestamps.retain(|t| *t >= cutoff);
            !timestamps.is_empty()
        });
    }

    fn valid_count(&self, id: &str) -> usize {
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window);
        self.windows
            .get(id)
            .map(|entry| {
                entry
                    .iter()
                    .filter(|t| cutoff.is_none_or(|c| **t >= c))
                    .count()
            })
            .unwrap_or(0)
    }
}

fn epoch_ms_after(delay: Duration) -> i64 {
    chrono::Utc::now().timestamp_millis() + delay.as_millis() as i64
}

/// Route classes with independent quotas. Exhausting one class never
/// affects another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Default,
    Search,
    Views,
    Likes,
    Rss,
    Og,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteClass::Default => "default",
            RouteClass::Search => "search",
            RouteClass::Views => "views",
            RouteClass::Likes => "likes",
            RouteClass::Rss => "rss",
            RouteClass::Og => "og",
        }
    }
}

/// Per-class quota.
#[derive(Debug, Clone, Copy)]
pub struct Quota {
    pub max_requests: usize,
    pub window: Duration,
}

impl Quota {
    pub const fn per_minute(max_requests: usize) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(60),
        }
    }
}

/// Long-lived registry of one limiter per route class.
///
/// Constructed once at the composition root and shared for the process
/// lifetime; constructing a limiter per request would reset every window
/// and defeat limiting entirely.
pub struct RateLimiters {
    limiters: HashMap<RouteClass, RateLimiter>,
}

impl RateLimiters {
    /// Registry with the default quotas: reads are generous, mutating and
    /// expensive families are tighter.
    pub fn with_defaults() -> Self {
        Self::new(&[
            (RouteClass::Default, Quota::per_minute(100)),
            (RouteClass::Search, Quota::per_minute(30)),
            (RouteClass::Views, Quota::per_minute(60)),
            (RouteClass::Likes, Quota::per_minute(30)),
            (RouteClass::Rss, Quota::per_minute(20)),
            (RouteClass::Og, Quota::per_minute(30)),
        ])
    }

    pub fn new(quotas: &[(RouteClass, Quota)]) -> Self {
        let limiters = quotas
            .iter()
            .map(|(class, q)| (*class, RateLimiter::new(q.max_requests, q.window)))
            .collect();
        Self { limiters }
    }

    /// Check a request against the limiter for its route class. Classes
    /// without an explicit quota fall back to `Default`.
    pub fn check(&self, class: RouteClass, id: &str) -> Decision {
        self.limiter(class).check(id)
    }

    pub fn limiter(&self, class: RouteClass) -> &RateLimiter {
        self.limiters
            .get(&class)
            .or_else(|| self.limiters.get(&RouteClass::Default))
            .expect("registry always contains a default limiter")
    }

    /// Prune stale windows across every class.
    pub fn sweep(&self) {
        for limiter in self.limiters.values() {
            limiter.sweep();
        }
    }
}
