//! Error types for webhook dispatch

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while dispatching webhooks
#[derive(Error, Debug)]
pub enum WebhookError {
    /// HTTP client could not be built or a request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid subscription URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Subscription URL is not http or https
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Payload serialization failed
    #[error("Payload error: {0}")]
    PayloadError(String),

    /// Payload template failed to parse or evaluate
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Subscription store or audit log failure
    #[error("Store error: {0}")]
    StoreError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Dispatcher workers were already started
    #[error("Dispatcher already started")]
    AlreadyStarted,

    /// Dispatcher has been stopped
    #[error("Dispatcher stopped")]
    Stopped,

    /// Workers did not drain within the shutdown grace period
    #[error("Shutdown grace period of {grace:?} elapsed before workers drained")]
    ShutdownTimeout {
        /// Grace period passed to `stop`
        grace: Duration,
    },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for WebhookError {
    fn from(err: serde_json::Error) -> Self {
        WebhookError::PayloadError(err.to_string())
    }
}

impl From<handlebars::RenderError> for WebhookError {
    fn from(err: handlebars::RenderError) -> Self {
        WebhookError::TemplateError(err.to_string())
    }
}

impl From<toml::de::Error> for WebhookError {
    fn from(err: toml::de::Error) -> Self {
        WebhookError::ConfigError(err.to_string())
    }
}
