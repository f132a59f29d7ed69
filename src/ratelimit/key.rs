//! Rate limit key construction.

/// Identifies the subject of a rate limit: what is being protected and who is
/// calling.
///
/// Rendered as `"<purpose>:<client>"`, for example
/// `"site-submission:203.0.113.7"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The route or form being protected
    pub purpose: String,
    /// The caller, usually a client IP address
    pub client: String,
}

impl RateLimitKey {
    pub fn new(purpose: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            client: client.into(),
        }
    }

    /// The flat string form used as the store key.
    pub fn as_string_key(&self) -> String {
        format!("{}:{}", self.purpose, self.client)
    }
}

impl std::fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.purpose, self.client)
    }
}
