//! Storage backends for rate limit state.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::Result;

use super::decision::Decision;
use super::quota::Quota;
use super::state::RateLimitState;

/// Trait for rate limit state stores.
///
/// `check_and_consume` must run the whole read-check-increment for a key as
/// one atomic step; concurrent callers on the same key may never admit more
/// than `quota.max` requests per window between them.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Apply one request for `key` at time `now`.
    async fn check_and_consume(&self, key: &str, now: u64, quota: Quota) -> Result<Decision>;

    /// Remove entries whose window has ended by `now`. Returns how many were removed.
    async fn sweep(&self, now: u64) -> Result<usize>;

    /// Current state for `key`, if tracked.
    async fn get(&self, key: &str) -> Result<Option<RateLimitState>>;

    /// Number of tracked keys.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Drop all state.
    async fn clear(&self) -> Result<()>;
}

/// In-process store backed by a sharded concurrent map.
///
/// Holding a `DashMap` entry keeps its shard locked, which makes each
/// check-and-increment atomic per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, RateLimitState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn check_and_consume(&self, key: &str, now: u64, quota: Quota) -> Result<Decision> {
        let decision = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut entry) => entry.get_mut().consume(now, quota),
            Entry::Vacant(entry) => {
                let (state, decision) = RateLimitState::open(now, quota);
                entry.insert(state);
                decision
            }
        };
        Ok(decision)
    }

    async fn sweep(&self, now: u64) -> Result<usize> {
        let mut removed = 0;
        self.entries.retain(|_, state| {
            let expired = state.is_expired(now);
            if expired {
                removed += 1;
            }
            !expired
        });
        Ok(removed)
    }

    async fn get(&self, key: &str) -> Result<Option<RateLimitState>> {
        Ok(self.entries.get(key).map(|state| *state))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}
