//! Shared state for HTTP handlers.

use std::sync::Arc;

use crate::ratelimit::{PolicyTable, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    /// The rate limiter instance
    pub limiter: Arc<RateLimiter>,
    /// Per-purpose quotas
    pub policies: Arc<PolicyTable>,
    /// Whether forwarded headers identify the client
    pub trust_forwarded_headers: bool,
}

impl AppState {
    pub fn new(limiter: Arc<RateLimiter>, policies: Arc<PolicyTable>) -> Self {
        Self {
            limiter,
            policies,
            trust_forwarded_headers: false,
        }
    }

    pub fn trust_forwarded_headers(mut self, trust: bool) -> Self {
        self.trust_forwarded_headers = trust;
        self
    }
}
