// rate_limit.rs - Fixed-window counters driven by `limit` statements.
//
// One window exists per limit action pattern, created on first use. A
// window whose period has fully elapsed restarts at the current time with
// a zero count.
//
// Checking consults only the most specific matching limit, while recording
// increments every matching limit. A call to `api.call` under both
// `limit api.* 100 per 60 seconds` and `limit api.call 5 per 60 seconds`
// is checked against the second and counted against both.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use covenant_ccl::{match_action, LimitStatement};

/// Counter for one limit pattern.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitState {
    /// Action pattern of the limit statement that owns this window.
    pub action: String,
    pub count: u64,
    /// Window start, epoch milliseconds.
    pub period_start: i64,
    pub period_seconds: u64,
    pub limit: u64,
}

impl RateLimitState {
    fn open(limit: &LimitStatement, now_ms: i64) -> Self {
        Self {
            action: limit.action.clone(),
            count: 0,
            period_start: now_ms,
            period_seconds: limit.period_seconds,
            limit: limit.count,
        }
    }

    fn expired(&self, now_ms: i64) -> bool {
        // Saturate: a period of many days in ms must not wrap to a short window.
        let period_ms = i64::try_from(self.period_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.period_start) >= period_ms
    }

    fn roll_if_expired(&mut self, now_ms: i64) {
        if self.expired(now_ms) {
            self.count = 0;
            self.period_start = now_ms;
        }
    }
}

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub exceeded: bool,
    /// Calls left in the current window; `None` when no limit applies.
    pub remaining: Option<u64>,
}

impl RateLimitStatus {
    pub fn unlimited() -> Self {
        Self {
            exceeded: false,
            remaining: None,
        }
    }
}

/// Window state for every limit pattern seen so far.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: BTreeMap<String, RateLimitState>,
}

/// The most specific limit matching `action`; ties go to the first declared.
pub fn governing_limit<'a>(limits: &'a [LimitStatement], action: &str) -> Option<&'a LimitStatement> {
    limits
        .iter()
        .filter(|l| match_action(&l.action, action))
        .min_by(|a, b| {
            b.specificity()
                .cmp(&a.specificity())
                .then(a.line.cmp(&b.line))
        })
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check the governing limit for `action`, opening or rolling its
    /// window as needed. Does not count the call.
    pub fn check(&mut self, limits: &[LimitStatement], action: &str, now_ms: i64) -> RateLimitStatus {
        let Some(limit) = governing_limit(limits, action) else {
            return RateLimitStatus::unlimited();
        };
        let window = self
            .windows
            .entry(limit.action.clone())
            .or_insert_with(|| RateLimitState::open(limit, now_ms));
        window.roll_if_expired(now_ms);
        status_of(window.count, limit.count)
    }

    /// Same answer as `check` without touching any window.
    pub fn peek(&self, limits: &[LimitStatement], action: &str, now_ms: i64) -> RateLimitStatus {
        let Some(limit) = governing_limit(limits, action) else {
            return RateLimitStatus::unlimited();
        };
        // An expired window reads as empty, exactly as `check` would reset it.
        let count = match self.windows.get(&limit.action) {
            Some(window) if !window.expired(now_ms) => window.count,
            _ => 0,
        };
        status_of(count, limit.count)
    }

    /// Count one permitted call against every limit matching `action`.
    pub fn record(&mut self, limits: &[LimitStatement], action: &str, now_ms: i64) {
        for limit in limits.iter().filter(|l| match_action(&l.action, action)) {
            let window = self
                .windows
                .entry(limit.action.clone())
                .or_insert_with(|| RateLimitState::open(limit, now_ms));
            window.roll_if_expired(now_ms);
            window.count += 1;
        }
    }

    /// Copy of every window, ordered by pattern.
    pub fn states(&self) -> Vec<RateLimitState> {
        self.windows.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.windows.clear();
    }
}

fn status_of(count: u64, limit: u64) -> RateLimitStatus {
    RateLimitStatus {
        exceeded: count >= limit,
        remaining: Some(limit.saturating_sub(count)),
    }
}
