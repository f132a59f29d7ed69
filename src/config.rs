//! Configuration management for Turnstile.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TurnstileError};

/// Environment variable prefix, e.g. `TURNSTILE__SERVER__HTTP_ADDR`.
const ENV_PREFIX: &str = "TURNSTILE";

/// Main configuration for the Turnstile service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnstileConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Honour `X-Forwarded-For` / `X-Real-IP` when deriving client addresses.
    /// Only enable behind a proxy that overwrites these headers.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            trust_forwarded_headers: false,
        }
    }
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Path to the per-purpose rules file
    pub rules_path: Option<String>,

    /// How often expired keys are evicted, in seconds (0 disables sweeping)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// How often the rules file is re-read, in seconds (0 disables reloading)
    #[serde(default)]
    pub rules_reload_interval_secs: u64,

    /// Window used for purposes with no configured policy
    #[serde(default = "default_window_ms")]
    pub default_window_ms: u64,

    /// Requests per window for purposes with no configured policy
    #[serde(default = "default_max")]
    pub default_max: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            rules_path: None,
            sweep_interval_secs: default_sweep_interval(),
            rules_reload_interval_secs: 0,
            default_window_ms: default_window_ms(),
            default_max: default_max(),
        }
    }
}

impl RateLimitingConfig {
    /// Sweep interval, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    /// Rules reload interval, or `None` when reloading is disabled.
    pub fn rules_reload_interval(&self) -> Option<Duration> {
        (self.rules_reload_interval_secs > 0)
            .then(|| Duration::from_secs(self.rules_reload_interval_secs))
    }
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TurnstileConfig {
    /// Load configuration from an optional YAML file, then `TURNSTILE__*`
    /// environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(TurnstileError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Yaml),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<TurnstileConfig>()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: TurnstileConfig = serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.rate_limiting.default_window_ms == 0 {
            return Err(TurnstileError::Config(
                "rate_limiting.default_window_ms must be positive".to_string(),
            ));
        }
        if self.rate_limiting.default_max == 0 {
            return Err(TurnstileError::Config(
                "rate_limiting.default_max must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
