//! Window length and request allowance for a rate limit.

use std::time::Duration;

use crate::error::{Result, TurnstileError};

/// How many requests are admitted per fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Window length in milliseconds
    pub window_ms: u64,
    /// Requests allowed per window
    pub max: u64,
}

impl Quota {
    pub fn new(window_ms: u64, max: u64) -> Self {
        Self { window_ms, max }
    }

    pub fn per_minute(max: u64) -> Self {
        Self::new(60_000, max)
    }

    pub fn per_window(window: Duration, max: u64) -> Self {
        Self::new(u64::try_from(window.as_millis()).unwrap_or(u64::MAX), max)
    }

    /// Reject zero-length windows and zero allowances.
    pub fn validate(&self) -> Result<()> {
        if self.window_ms == 0 {
            return Err(TurnstileError::InvalidArgument(
                "window_ms must be positive".to_string(),
            ));
        }
        if self.max == 0 {
            return Err(TurnstileError::InvalidArgument(
                "max must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
