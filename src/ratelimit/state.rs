//! Per-key fixed window state.

use super::decision::Decision;
use super::quota::Quota;

/// Request count for one key within its current fixed window.
///
/// A window opens on the first request for a key (or the first request after
/// the previous window ended) and lasts `window_ms`. Rejected requests do not
/// touch the count, so it never exceeds the quota's `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    /// Requests admitted in the current window
    count: u64,
    /// Epoch milliseconds at which the current window ends
    window_reset_at: u64,
}

impl RateLimitState {
    /// Open a new window at `now` and admit the request that opened it.
    pub fn open(now: u64, quota: Quota) -> (Self, Decision) {
        let state = Self {
            count: 1,
            window_reset_at: now.saturating_add(quota.window_ms),
        };
        (state, Decision::allow(quota.max.saturating_sub(1)))
    }

    /// Admit or reject one request against this window.
    ///
    /// An expired window is replaced first, so a request landing exactly on
    /// `window_reset_at` starts fresh.
    pub fn consume(&mut self, now: u64, quota: Quota) -> Decision {
        if self.is_expired(now) {
            let (state, decision) = Self::open(now, quota);
            *self = state;
            return decision;
        }

        if self.count >= quota.max {
            return Decision::deny(self.retry_after_secs(now));
        }

        self.count += 1;
        Decision::allow(quota.max - self.count)
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.window_reset_at
    }

    /// Whole seconds until the window resets, rounded up, at least 1.
    pub fn retry_after_secs(&self, now: u64) -> u64 {
        let remaining_ms = self.window_reset_at.saturating_sub(now);
        remaining_ms.div_ceil(1000).max(1)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn window_reset_at(&self) -> u64 {
        self.window_reset_at
    }
}
