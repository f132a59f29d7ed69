//! The outcome of a rate limit check.

use serde::{Deserialize, Serialize};

/// Admit/deny result returned for every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request is admitted
    pub allowed: bool,
    /// Requests still permitted in the current window (0 when denied)
    pub remaining: u64,
    /// Seconds until the window resets (0 when allowed)
    pub retry_after_secs: u64,
}

impl Decision {
    pub fn allow(remaining: u64) -> Self {
        Self {
            allowed: true,
            remaining,
            retry_after_secs: 0,
        }
    }

    /// A rejection; the retry hint is never below one second.
    pub fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            remaining: 0,
            retry_after_secs: retry_after_secs.max(1),
        }
    }
}
