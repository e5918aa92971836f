//! 客户端配置：默认值、YAML 文件与环境变量覆盖。
//!
//! Client configuration.
//!
//! Values are resolved from, lowest to highest precedence: built-in defaults,
//! an optional YAML document, then `GUARDLINK_*` environment variables.
//!
//! ```rust
//! use guardlink::config::ClientConfig;
//!
//! let config = ClientConfig::from_yaml_str(
//!     "base_url: https://api.example.com\nmax_concurrent_requests: 3\n",
//! )
//! .unwrap();
//! assert_eq!(config.max_concurrent_requests, 3);
//! assert!(config.validate().is_ok());
//! ```

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub path_prefix: String,
    pub default_timeout_secs: u64,
    pub breaker_failure_threshold: u32,
    pub breaker_recovery_mins: u64,
    pub max_concurrent_requests: usize,
    pub cache_ttl_mins: u64,
    pub max_cache_entries: usize,
    /// Interval of the background cache/metrics sweep. `0` disables the task.
    pub sweep_interval_mins: u64,
    pub metrics_retention_hours: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            path_prefix: "/api/v1".to_string(),
            default_timeout_secs: 30,
            breaker_failure_threshold: 5,
            breaker_recovery_mins: 1,
            max_concurrent_requests: 5,
            cache_ttl_mins: 5,
            max_cache_entries: 100,
            sweep_interval_mins: 60,
            metrics_retention_hours: 24,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| s.trim().parse::<T>().ok())
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Defaults overridden by `GUARDLINK_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid YAML configuration: {}", e),
                ErrorContext::new().with_source("yaml_loader"),
            )
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read configuration file: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("yaml_loader"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    /// Overlay environment variables. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        if let Ok(url) = env::var("GUARDLINK_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url.trim().to_string();
            }
        }
        if let Ok(prefix) = env::var("GUARDLINK_PATH_PREFIX") {
            self.path_prefix = prefix.trim().to_string();
        }
        if let Some(v) = env_parse("GUARDLINK_TIMEOUT_SECS") {
            self.default_timeout_secs = v;
        }
        if let Some(v) = env_parse("GUARDLINK_BREAKER_THRESHOLD") {
            self.breaker_failure_threshold = v;
        }
        if let Some(v) = env_parse("GUARDLINK_BREAKER_RECOVERY_MINS") {
            self.breaker_recovery_mins = v;
        }
        if let Some(v) = env_parse("GUARDLINK_MAX_CONCURRENT") {
            self.max_concurrent_requests = v;
        }
        if let Some(v) = env_parse("GUARDLINK_CACHE_TTL_MINS") {
            self.cache_ttl_mins = v;
        }
        if let Some(v) = env_parse("GUARDLINK_CACHE_MAX_ENTRIES") {
            self.max_cache_entries = v;
        }
        if let Some(v) = env_parse("GUARDLINK_SWEEP_INTERVAL_MINS") {
            self.sweep_interval_mins = v;
        }
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_breaker(mut self, failure_threshold: u32, recovery_mins: u64) -> Self {
        self.breaker_failure_threshold = failure_threshold;
        self.breaker_recovery_mins = recovery_mins;
        self
    }

    pub fn with_max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n;
        self
    }

    pub fn with_cache(mut self, ttl_mins: u64, max_entries: usize) -> Self {
        self.cache_ttl_mins = ttl_mins;
        self.max_cache_entries = max_entries;
        self
    }

    pub fn with_sweep_interval_mins(mut self, mins: u64) -> Self {
        self.sweep_interval_mins = mins;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    pub fn breaker_recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker_recovery_mins * 60)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_mins * 60)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_mins > 0).then(|| Duration::from_secs(self.sweep_interval_mins * 60))
    }

    pub fn metrics_retention(&self) -> Duration {
        Duration::from_secs(self.metrics_retention_hours * 3600)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &str, msg: String| {
            Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path(field)
                    .with_source("config_validator"),
            )
        };

        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "base_url is required".into()));
        }
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| invalid("base_url", format!("base_url is not a valid URL: {}", e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(
                "base_url",
                format!("unsupported URL scheme '{}'", parsed.scheme()),
            ));
        }
        if self.default_timeout_secs == 0 {
            return Err(invalid(
                "default_timeout_secs",
                "default timeout must be at least 1 second".into(),
            ));
        }
        if self.breaker_failure_threshold == 0 {
            return Err(invalid(
                "breaker_failure_threshold",
                "failure threshold must be at least 1".into(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(invalid(
                "max_concurrent_requests",
                "max_concurrent_requests must be at least 1".into(),
            ));
        }
        if self.max_cache_entries == 0 {
            return Err(invalid(
                "max_cache_entries",
                "max_cache_entries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.path_prefix, "/api/v1");
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert_eq!(config.breaker_failure_threshold, 5);
        assert_eq!(config.breaker_recovery_timeout(), Duration::from_secs(60));
        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.max_cache_entries, 100);
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(config.metrics_retention(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let yaml = r#"
base_url: https://safety.example.com
path_prefix: /v2
breaker_failure_threshold: 3
breaker_recovery_mins: 5
cache_ttl_mins: 10
max_cache_entries: 2
sweep_interval_mins: 0
"#;
        let config = ClientConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.base_url, "https://safety.example.com");
        assert_eq!(config.path_prefix, "/v2");
        assert_eq!(config.breaker_failure_threshold, 3);
        assert_eq!(config.breaker_recovery_timeout(), Duration::from_secs(300));
        assert_eq!(config.max_cache_entries, 2);
        assert_eq!(config.sweep_interval(), None);
        // untouched fields keep their defaults
        assert_eq!(config.max_concurrent_requests, 5);
    }

    #[test]
    fn test_invalid_yaml_is_configuration_error() {
        let err = ClientConfig::from_yaml_str("base_url: [unterminated").unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(ClientConfig::default().validate().is_err());
        assert!(ClientConfig::new("not a url").validate().is_err());
        assert!(ClientConfig::new("ftp://example.com").validate().is_err());

        let zero_concurrency =
            ClientConfig::new("https://example.com").with_max_concurrent_requests(0);
        let err = zero_concurrency.validate().unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("max_concurrent_requests")
        );

        let zero_threshold = ClientConfig::new("https://example.com").with_breaker(0, 1);
        assert!(zero_threshold.validate().is_err());

        let zero_cache = ClientConfig::new("https://example.com").with_cache(5, 0);
        assert!(zero_cache.validate().is_err());

        assert!(ClientConfig::new("https://example.com").validate().is_ok());
    }

    #[test]
    fn test_env_overlay() {
        // Unique variable values; other tests never read these names.
        env::set_var("GUARDLINK_BASE_URL", "http://env.example.com");
        env::set_var("GUARDLINK_MAX_CONCURRENT", "9");
        env::set_var("GUARDLINK_CACHE_MAX_ENTRIES", "not-a-number");

        let config = ClientConfig::from_env();
        assert_eq!(config.base_url, "http://env.example.com");
        assert_eq!(config.max_concurrent_requests, 9);
        assert_eq!(config.max_cache_entries, 100);

        env::remove_var("GUARDLINK_BASE_URL");
        env::remove_var("GUARDLINK_MAX_CONCURRENT");
        env::remove_var("GUARDLINK_CACHE_MAX_ENTRIES");
    }
}
