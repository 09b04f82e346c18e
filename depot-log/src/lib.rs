//! Depot Logging
//!
//! Installs a `tracing` subscriber configured from the environment. Every
//! Depot crate logs through the `tracing` macros; this crate only decides
//! where the events go and how they look.
//!
//! # Usage
//!
//! ```rust,no_run
//! // Reads DEPOT_* variables and RUST_LOG once, then installs the subscriber
//! depot_log::init();
//!
//! tracing::info!(repository = "maven-releases", "webhook dispatcher ready");
//! ```
//!
//! # Environment Variables
//!
//! - `DEPOT_DEBUG=1` - Enable debug logging
//! - `DEPOT_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `DEPOT_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `DEPOT_LOG_COLOR=1|0` - Enable/disable colors
//! - `DEPOT_LOG_TIMESTAMPS=1|0` - Include timestamps
//! - `DEPOT_LOG_MODULE=1|0` - Include the event target
//! - `RUST_LOG` - Full filter directives, overriding the level

use once_cell::sync::Lazy;
use std::env;
use tracing::Subscriber;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Filter directive for this level.
    pub fn directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.directive().to_uppercase())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line, human readable
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Parse a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration read once from the environment.
static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled (ignored for JSON)
    pub color: bool,
    /// Whether to include timestamps
    pub timestamps: bool,
    /// Whether to include the event target
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            timestamps: true,
            module_path: true,
        }
    }
}

impl LogConfig {
    /// Create config from `DEPOT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key).map(|v| {
                let v = v.trim().to_lowercase();
                v == "1" || v == "true"
            })
        };

        let debug = flag("DEPOT_DEBUG").unwrap_or(false);

        let level = lookup("DEPOT_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("DEPOT_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = flag("DEPOT_LOG_COLOR")
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        Self {
            debug,
            level,
            format,
            color,
            timestamps: flag("DEPOT_LOG_TIMESTAMPS").unwrap_or(true),
            module_path: flag("DEPOT_LOG_MODULE").unwrap_or(true),
        }
    }

    /// Event filter: `RUST_LOG` when set and valid, otherwise the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.directive()))
    }

    fn layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.module_path)
            .with_timer(ChronoUtc::rfc_3339());

        match (self.format, self.timestamps) {
            (Format::Json, true) => layer.json().boxed(),
            (Format::Json, false) => layer.json().without_time().boxed(),
            (Format::Pretty, true) => layer.pretty().with_ansi(self.color).boxed(),
            (Format::Pretty, false) => layer.pretty().with_ansi(self.color).without_time().boxed(),
            (Format::Compact, true) => layer.compact().with_ansi(self.color).boxed(),
            (Format::Compact, false) => layer
                .compact()
                .with_ansi(self.color)
                .without_time()
                .boxed(),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Get the configuration read from the environment.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

/// Install the global subscriber from the environment.
///
/// Safe to call more than once; returns whether this call installed it.
pub fn init() -> bool {
    init_with(config())
}

/// Install the global subscriber with an explicit configuration.
///
/// Returns `false` when a global subscriber was already set.
pub fn init_with(config: &LogConfig) -> bool {
    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(config.layer())
        .try_init()
        .is_ok()
}

// ============================================================================
// Tests
// ============================================================================

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
    fn test_level_ordering() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
        assert!(Level::Error < Level::Off);
    }

    #[test]
    fn test_level_parse() {
        assert_eq!(Level::parse("debug"), Some(Level::Debug));
        assert_eq!(Level::parse("DEBUG"), Some(Level::Debug));
        assert_eq!(Level::parse("warning"), Some(Level::Warn));
        assert_eq!(Level::parse("none"), Some(Level::Off));
        assert_eq!(Level::parse("invalid"), None);
        assert_eq!(Level::Warn.to_string(), "WARN");
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(Format::parse("pretty"), Some(Format::Pretty));
        assert_eq!(Format::parse("Compact"), Some(Format::Compact));
        assert_eq!(Format::parse("json"), Some(Format::Json));
        assert_eq!(Format::parse("xml"), None);
    }

    #[test]
    fn test_defaults_without_env() {
        let config = LogConfig::from_lookup(lookup(&[("NO_COLOR", "1")]));
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_debug_raises_default_level() {
        let config = LogConfig::from_lookup(lookup(&[("DEPOT_DEBUG", "true")]));
        assert!(config.debug);
        assert_eq!(config.level, Level::Debug);

        let config = LogConfig::from_lookup(lookup(&[
            ("DEPOT_DEBUG", "1"),
            ("DEPOT_LOG_LEVEL", "warn"),
        ]));
        assert_eq!(config.level, Level::Warn);
    }

    #[test]
    fn test_from_lookup() {
        let config = LogConfig::from_lookup(lookup(&[
            ("DEPOT_LOG_FORMAT", "pretty"),
            ("DEPOT_LOG_COLOR", "0"),
            ("DEPOT_LOG_TIMESTAMPS", "false"),
            ("DEPOT_LOG_MODULE", "0"),
            ("DEPOT_LOG_LEVEL", "bogus"),
        ]));

        assert_eq!(config.format, Format::Pretty);
        assert_eq!(config.level, Level::Info);
        assert!(!config.color);
        assert!(!config.timestamps);
        assert!(!config.module_path);
    }

    #[test]
    fn test_color_detection() {
        let config = LogConfig::from_lookup(lookup(&[("TERM", "xterm")]));
        assert!(config.color);

        let config = LogConfig::from_lookup(lookup(&[("TERM", "xterm"), ("NO_COLOR", "1")]));
        assert!(!config.color);
    }

    #[test]
    fn test_init_is_idempotent() {
        let config = LogConfig {
            format: Format::Compact,
            ..LogConfig::default()
        };
        init_with(&config);
        assert!(!init_with(&config));
        assert!(!init());

        tracing::info!(component = "depot-log", "subscriber installed");
    }
}
