//! Core rate limiter implementation.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{Result, TurnstileError};

use super::clock::{Clock, SystemClock};
use super::decision::Decision;
use super::key::RateLimitKey;
use super::quota::Quota;
use super::store::{MemoryStore, RateLimitStore};

/// Fixed-window rate limiter.
///
/// The limiter owns no state of its own; counts live in the injected store
/// and time comes from the injected clock. It is cheap to share behind an
/// `Arc` across tasks.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter with an in-memory store and the system clock.
    pub fn new() -> Self {
        Self::with_parts(Arc::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    /// Create a rate limiter over an explicit store and clock.
    pub fn with_parts(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Decide whether one more request for `key` fits in `max` requests per
    /// `window_ms` milliseconds, and record it if it does.
    pub async fn check_and_consume(&self, key: &str, window_ms: u64, max: u64) -> Result<Decision> {
        if key.is_empty() {
            return Err(TurnstileError::InvalidArgument(
                "key must not be empty".to_string(),
            ));
        }
        let quota = Quota::new(window_ms, max);
        quota.validate()?;

        let now = self.clock.now_millis();

        trace!(
            key = %key,
            window_ms = window_ms,
            max = max,
            now = now,
            "Checking rate limit"
        );

        let decision = self.store.check_and_consume(key, now, quota).await?;

        if !decision.allowed {
            debug!(
                key = %key,
                retry_after_secs = decision.retry_after_secs,
                "Rate limit exceeded"
            );
        }

        Ok(decision)
    }

    /// Typed form of [`RateLimiter::check_and_consume`].
    pub async fn check(&self, key: &RateLimitKey, quota: Quota) -> Result<Decision> {
        self.check_and_consume(&key.as_string_key(), quota.window_ms, quota.max)
            .await
    }

    /// Evict every key whose window has ended.
    pub async fn sweep(&self) -> Result<usize> {
        let now = self.clock.now_millis();
        self.store.sweep(now).await
    }

    /// Get the number of tracked keys.
    pub async fn tracked_keys(&self) -> Result<usize> {
        self.store.len().await
    }

    /// Clear all state.
    ///
    /// This is primarily useful for testing.
    pub async fn clear(&self) -> Result<()> {
        self.store.clear().await
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
