//! Configuration for the webhook dispatcher

use crate::{Result, RetryPolicy, WebhookError};
use serde::Deserialize;
use std::time::Duration;

/// Prefix of the environment variables read by [`DispatcherConfig::from_env`]
pub const ENV_PREFIX: &str = "DEPOT_WEBHOOKS";

/// Default number of worker tasks
pub const DEFAULT_WORKERS: usize = 2;
/// Default queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// Default per-request timeout
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default delay before the first retry
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
/// Default backoff cap
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Configuration for the webhook dispatcher.
///
/// Zero values mean "unset". [`DispatcherConfig::normalized`] fills them in
/// once, when the dispatcher is built; nothing downstream re-checks defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Number of worker tasks
    pub workers: usize,

    /// Capacity of the event queue
    pub queue_capacity: usize,

    /// Timeout of a single delivery attempt
    pub http_timeout: Duration,

    /// Retries after the first attempt; `None` means the default
    pub max_retries: Option<u32>,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Upper bound for the retry delay
    pub max_backoff: Duration,

    /// User-Agent header for outgoing requests
    pub user_agent: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            max_retries: Some(DEFAULT_MAX_RETRIES),
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
            user_agent: default_user_agent(),
        }
    }
}

impl DispatcherConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::new()
    }

    /// Fill every unset value with its default
    pub fn normalized(mut self) -> Self {
        if self.workers == 0 {
            self.workers = DEFAULT_WORKERS;
        }
        if self.queue_capacity == 0 {
            self.queue_capacity = DEFAULT_QUEUE_CAPACITY;
        }
        if self.http_timeout.is_zero() {
            self.http_timeout = DEFAULT_HTTP_TIMEOUT;
        }
        if self.max_retries.is_none() {
            self.max_retries = Some(DEFAULT_MAX_RETRIES);
        }
        if self.initial_backoff.is_zero() {
            self.initial_backoff = DEFAULT_INITIAL_BACKOFF;
        }
        if self.max_backoff.is_zero() {
            self.max_backoff = DEFAULT_MAX_BACKOFF;
        }
        if self.max_backoff < self.initial_backoff {
            self.max_backoff = self.initial_backoff;
        }
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        self
    }

    /// Retry policy described by this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            initial_backoff: self.initial_backoff,
            max_backoff: self.max_backoff,
        }
    }

    /// Load from `DEPOT_WEBHOOKS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(format!("{}_{}", ENV_PREFIX, key)).ok())
    }

    /// Load from a TOML document, either flat or under a `[webhooks]` table
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(content)?;
        let section = match table.remove("webhooks") {
            Some(toml::Value::Table(nested)) => nested,
            Some(_) => {
                return Err(WebhookError::ConfigError(
                    "`webhooks` must be a table".to_string(),
                ));
            }
            None => table,
        };
        let settings: Settings = toml::Value::Table(section).try_into()?;
        Ok(settings.into_config())
    }

    /// Load from a TOML file
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WebhookError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load from an arbitrary key lookup (keys are upper case, unprefixed)
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Settings {
            workers: parse_var(&lookup, "WORKERS")?,
            queue_capacity: parse_var(&lookup, "QUEUE_CAPACITY")?,
            http_timeout_ms: parse_var(&lookup, "HTTP_TIMEOUT_MS")?,
            max_retries: parse_var(&lookup, "MAX_RETRIES")?,
            initial_backoff_ms: parse_var(&lookup, "INITIAL_BACKOFF_MS")?,
            max_backoff_ms: parse_var(&lookup, "MAX_BACKOFF_MS")?,
            user_agent: lookup("USER_AGENT"),
        };
        Ok(settings.into_config())
    }
}

fn default_user_agent() -> String {
    format!("Depot-Webhooks/{}", env!("CARGO_PKG_VERSION"))
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            WebhookError::ConfigError(format!("{}_{}: {}", ENV_PREFIX, key, e))
        }),
    }
}

/// Settings as they appear in files and the environment
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Settings {
    workers: Option<usize>,
    queue_capacity: Option<usize>,
    http_timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    user_agent: Option<String>,
}

impl Settings {
    fn into_config(self) -> DispatcherConfig {
        let millis = |ms: Option<u64>| ms.map(Duration::from_millis).unwrap_or(Duration::ZERO);

        DispatcherConfig {
            workers: self.workers.unwrap_or(0),
            queue_capacity: self.queue_capacity.unwrap_or(0),
            http_timeout: millis(self.http_timeout_ms),
            max_retries: self.max_retries,
            initial_backoff: millis(self.initial_backoff_ms),
            max_backoff: millis(self.max_backoff_ms),
            user_agent: self.user_agent.unwrap_or_default(),
        }
        .normalized()
    }
}

/// Builder for DispatcherConfig
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl DispatcherConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: DispatcherConfig::default(),
        }
    }

    /// Set the number of workers
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the per-attempt timeout
    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    /// Set the number of retries after the first attempt
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = Some(retries);
        self
    }

    /// Disable retries
    pub fn no_retries(mut self) -> Self {
        self.config.max_retries = Some(0);
        self
    }

    /// Set the first retry delay
    pub fn initial_backoff(mut self, backoff: Duration) -> Self {
        self.config.initial_backoff = backoff;
        self
    }

    /// Set the retry delay cap
    pub fn max_backoff(mut self, backoff: Duration) -> Self {
        self.config.max_backoff = backoff;
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> DispatcherConfig {
        self.config.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = DispatcherConfig::default();
        assert_eq!(config.workers, 2);
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.max_retries, Some(5));
        assert_eq!(config.initial_backoff, Duration::from_millis(500));
        assert_eq!(config.max_backoff, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("Depot-Webhooks/"));
    }

    #[test]
    fn test_normalize_zero_values() {
        let config = DispatcherConfig {
            workers: 0,
            queue_capacity: 0,
            http_timeout: Duration::ZERO,
            max_retries: None,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            user_agent: String::new(),
        }
        .normalized();

        assert_eq!(config, DispatcherConfig::default());
    }

    #[test]
    fn test_zero_retries_is_kept() {
        let config = DispatcherConfig::builder().no_retries().build();
        assert_eq!(config.max_retries, Some(0));
        assert_eq!(config.retry_policy().max_attempts(), 1);
    }

    #[test]
    fn test_max_backoff_raised_to_initial() {
        let config = DispatcherConfig::builder()
            .initial_backoff(Duration::from_secs(2))
            .max_backoff(Duration::from_secs(1))
            .build();
        assert_eq!(config.max_backoff, Duration::from_secs(2));
    }

    #[test]
    fn test_builder() {
        let config = DispatcherConfig::builder()
            .workers(4)
            .queue_capacity(10)
            .http_timeout(Duration::from_secs(3))
            .max_retries(3)
            .initial_backoff(Duration::from_millis(100))
            .max_backoff(Duration::from_millis(400))
            .build();

        assert_eq!(config.workers, 4);
        assert_eq!(config.queue_capacity, 10);
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.initial_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_from_lookup() {
        let config = DispatcherConfig::from_lookup(lookup(&[
            ("WORKERS", "8"),
            ("HTTP_TIMEOUT_MS", "2500"),
            ("MAX_RETRIES", "0"),
            ("USER_AGENT", "custom/1.0"),
        ]))
        .unwrap();

        assert_eq!(config.workers, 8);
        assert_eq!(config.http_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_retries, Some(0));
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.user_agent, "custom/1.0");
    }

    #[test]
    fn test_from_lookup_invalid_number() {
        let result = DispatcherConfig::from_lookup(lookup(&[("WORKERS", "many")]));
        match result {
            Err(WebhookError::ConfigError(message)) => {
                assert!(message.contains("DEPOT_WEBHOOKS_WORKERS"))
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_from_toml_nested() {
        let config = DispatcherConfig::from_toml_str(
            r#"
            [webhooks]
            workers = 3
            max_retries = 2
            initial_backoff_ms = 100
            max_backoff_ms = 400
            "#,
        )
        .unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.max_retries, Some(2));
        assert_eq!(config.max_backoff, Duration::from_millis(400));
        assert_eq!(config.http_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_from_toml_flat() {
        let config = DispatcherConfig::from_toml_str("queue_capacity = 5\n").unwrap();
        assert_eq!(config.queue_capacity, 5);
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_from_toml_unknown_key() {
        let result = DispatcherConfig::from_toml_str("[webhooks]\nworkerz = 3\n");
        assert!(matches!(result, Err(WebhookError::ConfigError(_))));
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = DispatcherConfig::from_toml_str("workers = \"two\"");
        assert!(matches!(result, Err(WebhookError::ConfigError(_))));
    }
}
