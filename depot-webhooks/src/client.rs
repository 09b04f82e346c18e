//! HTTP client performing single delivery attempts

use crate::{DispatcherConfig, Result};
use reqwest::Client;
use reqwest::header::HeaderMap;
use reqwest::redirect::Policy;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// A fully prepared outbound request, reused across attempts
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    /// Subscription endpoint
    pub url: Url,

    /// Headers assembled for this delivery
    pub headers: HeaderMap,

    /// Rendered payload
    pub body: String,
}

/// How an HTTP status is treated by the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx: delivered
    Success,

    /// 5xx: try again
    Retryable,

    /// Anything else: give up at once
    Terminal,
}

impl StatusClass {
    /// Classify an HTTP status code
    pub fn of(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            500..=599 => Self::Retryable,
            _ => Self::Terminal,
        }
    }
}

/// Result of a single attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The endpoint accepted the payload
    Delivered {
        /// 2xx status returned by the endpoint
        status: u16,
    },

    /// Transport error or server error; another attempt may succeed
    Retryable {
        /// 5xx status, or `None` for a transport error
        status: Option<u16>,
        /// Description of the failure
        error: String,
    },

    /// The endpoint refused the payload; retrying will not help
    Rejected {
        /// Status returned by the endpoint
        status: u16,
        /// Description of the failure
        error: String,
    },
}

/// Client for single, bounded-timeout webhook POSTs
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    http_client: Client,
    timeout: Duration,
}

impl DeliveryClient {
    /// Create a client with the given per-request timeout.
    ///
    /// Redirects are not followed: a 3xx is reported as a terminal failure.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            http_client,
            timeout,
        })
    }

    /// Create a client from dispatcher settings
    pub fn from_config(config: &DispatcherConfig) -> Result<Self> {
        Self::new(config.http_timeout, &config.user_agent)
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST the payload once and classify the outcome
    pub async fn attempt(&self, request: &DeliveryRequest) -> AttemptOutcome {
        let response = self
            .http_client
            .post(request.url.clone())
            .headers(request.headers.clone())
            .body(request.body.clone())
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                debug!(url = %request.url, status, "webhook endpoint responded");

                match StatusClass::of(status) {
                    StatusClass::Success => AttemptOutcome::Delivered { status },
                    StatusClass::Retryable => AttemptOutcome::Retryable {
                        status: Some(status),
                        error: format!("HTTP {}", status),
                    },
                    StatusClass::Terminal => AttemptOutcome::Rejected {
                        status,
                        error: format!("HTTP {}", status),
                    },
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("request timed out after {:?}", self.timeout)
                } else {
                    e.to_string()
                };
                debug!(url = %request.url, error = %error, "webhook request failed");
                AttemptOutcome::Retryable {
                    status: None,
                    error,
                }
            }
        }
    }
}
