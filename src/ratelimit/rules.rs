//! Per-purpose rate limit policies.
//!
//! Each protected route (site submission, contact form, newsletter signup,
//! prediction entry) is identified by a purpose label and gets a fixed window
//! and request allowance from configuration.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::quota::Quota;
use crate::error::{Result, TurnstileError};

/// A complete policy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitRules {
    /// Policy used for purposes that have no entry of their own
    #[serde(default)]
    pub default: Option<RateLimitRule>,
    /// Policies keyed by purpose
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

/// The policy for one purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// The purpose label this policy applies to
    pub purpose: String,
    #[serde(flatten)]
    pub rule: RateLimitRule,
}

/// A rate limit rule specifying the limit and time window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Number of requests allowed per window
    pub requests_per_unit: u64,
    /// The window length as a named unit
    #[serde(default)]
    pub unit: Option<TimeUnit>,
    /// The window length in milliseconds; takes precedence over `unit`
    #[serde(default)]
    pub window_ms: Option<u64>,
}

/// Named window lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
}

impl TimeUnit {
    pub fn millis(&self) -> u64 {
        match self {
            TimeUnit::Second => 1_000,
            TimeUnit::Minute => 60_000,
            TimeUnit::Hour => 3_600_000,
            TimeUnit::Day => 86_400_000,
        }
    }
}

impl RateLimitRule {
    /// The quota this rule describes. A rule with neither `window_ms` nor
    /// `unit` uses a one minute window.
    pub fn quota(&self) -> Quota {
        let window_ms = self
            .window_ms
            .or_else(|| self.unit.map(|u| u.millis()))
            .unwrap_or(TimeUnit::Minute.millis());
        Quota::new(window_ms, self.requests_per_unit)
    }
}

impl RateLimitRules {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules with only a default policy.
    pub fn with_default(quota: Quota) -> Self {
        Self {
            default: Some(RateLimitRule {
                requests_per_unit: quota.max,
                unit: None,
                window_ms: Some(quota.window_ms),
            }),
            policies: Vec::new(),
        }
    }

    /// Use `quota` as the default policy unless one is already configured.
    pub fn with_fallback(mut self, quota: Quota) -> Self {
        if self.default.is_none() {
            self.default = Self::with_default(quota).default;
        }
        self
    }

    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: RateLimitRules = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse rate limit rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Check every policy describes a usable quota.
    pub fn validate(&self) -> Result<()> {
        if let Some(rule) = &self.default {
            rule.quota()
                .validate()
                .map_err(|e| TurnstileError::Config(format!("default policy: {}", e)))?;
        }
        for policy in &self.policies {
            if policy.purpose.is_empty() {
                return Err(TurnstileError::Config(
                    "policy purpose must not be empty".to_string(),
                ));
            }
            policy
                .rule
                .quota()
                .validate()
                .map_err(|e| TurnstileError::Config(format!("policy {}: {}", policy.purpose, e)))?;
        }
        Ok(())
    }

    /// Find the quota for a purpose, falling back to the default policy.
    pub fn find_quota(&self, purpose: &str) -> Option<Quota> {
        self.policies
            .iter()
            .find(|p| p.purpose == purpose)
            .map(|p| &p.rule)
            .or(self.default.as_ref())
            .map(RateLimitRule::quota)
    }
}

/// Rules that can be swapped while requests are being served.
#[derive(Debug, Default)]
pub struct PolicyTable {
    rules: RwLock<RateLimitRules>,
}

impl PolicyTable {
    pub fn new(rules: RateLimitRules) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    pub fn find_quota(&self, purpose: &str) -> Option<Quota> {
        self.rules.read().find_quota(purpose)
    }

    /// Replace the active rules.
    pub fn replace(&self, rules: RateLimitRules) {
        *self.rules.write() = rules;
    }

    /// Get a copy of the active rules.
    pub fn snapshot(&self) -> RateLimitRules {
        self.rules.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE_RULES: &str = r#"
default:
  requests_per_unit: 20
  unit: minute
policies:
  - purpose: site-submission
    requests_per_unit: 10
    unit: minute
  - purpose: contact
    requests_per_unit: 5
    window_ms: 600000
  - purpose: prediction
    requests_per_unit: 3
    unit: hour
"#;

    #[test]
    fn test_parse_policies() {
        let rules = RateLimitRules::from_yaml(SITE_RULES).unwrap();
        assert_eq!(rules.policies.len(), 3);
        assert!(rules.default.is_some());
    }

    #[test]
    fn test_find_quota_by_purpose() {
        let rules = RateLimitRules::from_yaml(SITE_RULES).unwrap();

        assert_eq!(rules.find_quota("site-submission"), Some(Quota::new(60_000, 10)));
        assert_eq!(rules.find_quota("contact"), Some(Quota::new(600_000, 5)));
        assert_eq!(rules.find_quota("prediction"), Some(Quota::new(3_600_000, 3)));
    }

    #[test]
    fn test_unknown_purpose_uses_default() {
        let rules = RateLimitRules::from_yaml(SITE_RULES).unwrap();
        assert_eq!(rules.find_quota("newsletter"), Some(Quota::new(60_000, 20)));
    }

    #[test]
    fn test_no_default_no_match() {
        let yaml = r#"
policies:
  - purpose: contact
    requests_per_unit: 5
"#;
        let rules = RateLimitRules::from_yaml(yaml).unwrap();
        assert_eq!(rules.find_quota("contact"), Some(Quota::new(60_000, 5)));
        assert!(rules.find_quota("newsletter").is_none());
    }

    #[test]
    fn test_fallback_fills_missing_default_only() {
        let yaml = r#"
policies:
  - purpose: contact
    requests_per_unit: 5
"#;
        let rules = RateLimitRules::from_yaml(yaml)
            .unwrap()
            .with_fallback(Quota::per_minute(10));
        assert_eq!(rules.find_quota("newsletter"), Some(Quota::per_minute(10)));
        assert_eq!(rules.find_quota("contact"), Some(Quota::new(60_000, 5)));

        let rules = RateLimitRules::from_yaml(SITE_RULES)
            .unwrap()
            .with_fallback(Quota::per_minute(10));
        assert_eq!(rules.find_quota("newsletter"), Some(Quota::new(60_000, 20)));
    }

    #[test]
    fn test_window_ms_overrides_unit() {
        let yaml = r#"
policies:
  - purpose: contact
    requests_per_unit: 5
    unit: day
    window_ms: 1500
"#;
        let rules = RateLimitRules::from_yaml(yaml).unwrap();
        assert_eq!(rules.find_quota("contact"), Some(Quota::new(1_500, 5)));
    }

    #[test]
    fn test_zero_requests_rejected() {
        let yaml = r#"
policies:
  - purpose: contact
    requests_per_unit: 0
    unit: minute
"#;
        let err = RateLimitRules::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, TurnstileError::Config(_)));
    }

    #[test]
    fn test_unknown_unit_rejected() {
        let yaml = r#"
policies:
  - purpose: contact
    requests_per_unit: 5
    unit: fortnight
"#;
        assert!(RateLimitRules::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_policy_table_replace() {
        let table = PolicyTable::new(RateLimitRules::with_default(Quota::per_minute(10)));
        assert_eq!(table.find_quota("contact"), Some(Quota::per_minute(10)));

        table.replace(RateLimitRules::from_yaml(SITE_RULES).unwrap());
        assert_eq!(table.find_quota("contact"), Some(Quota::new(600_000, 5)));
        assert_eq!(table.snapshot().policies.len(), 3);
    }
}
