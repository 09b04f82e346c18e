//! Retry policy for webhook delivery

use crate::client::{AttemptOutcome, DeliveryClient, DeliveryRequest};
use crate::config::{DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES};
use crate::DeliveryOutcome;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Exponential backoff without jitter.
///
/// The delay starts at `initial_backoff` and doubles after every retryable
/// failure, capped at `max_backoff`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub initial_backoff: Duration,

    /// Maximum delay between retries
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Total number of attempts, first one included
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Check if another attempt may follow the given one (1-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let mut delay = self.initial_backoff;
        for _ in 1..attempt {
            if delay >= self.max_backoff {
                break;
            }
            delay = delay
                .checked_mul(2)
                .unwrap_or(self.max_backoff)
                .min(self.max_backoff);
        }
        delay
    }

    /// Drive a delivery until success, terminal failure or exhaustion.
    ///
    /// Cancelling `shutdown` interrupts a backoff sleep and ends the sequence
    /// with the last observed outcome. An attempt in flight is never
    /// interrupted; it is bounded by the client timeout.
    pub async fn execute(
        &self,
        client: &DeliveryClient,
        request: &DeliveryRequest,
        shutdown: &CancellationToken,
    ) -> DeliveryOutcome {
        let mut outcome = DeliveryOutcome {
            status_code: None,
            success: false,
            error: None,
            attempts: 0,
        };

        loop {
            outcome.attempts += 1;
            let attempt = outcome.attempts;
            debug!(url = %request.url, attempt, "webhook delivery attempt");

            match client.attempt(request).await {
                AttemptOutcome::Delivered { status } => {
                    info!(url = %request.url, status, attempt, "webhook delivered");
                    outcome.status_code = Some(status);
                    outcome.success = true;
                    outcome.error = None;
                    return outcome;
                }
                AttemptOutcome::Rejected { status, error } => {
                    warn!(url = %request.url, status, attempt, "webhook rejected, not retrying");
                    outcome.status_code = Some(status);
                    outcome.error = Some(error);
                    return outcome;
                }
                AttemptOutcome::Retryable { status, error } => {
                    warn!(
                        url = %request.url,
                        status = ?status,
                        attempt,
                        error = %error,
                        "webhook delivery failed"
                    );
                    if status.is_some() {
                        outcome.status_code = status;
                    }
                    outcome.error = Some(error);
                }
            }

            if !self.should_retry(attempt) {
                warn!(url = %request.url, attempts = attempt, "webhook retries exhausted");
                return outcome;
            }

            let delay = self.delay_for_attempt(attempt);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    warn!(url = %request.url, attempts = attempt, "webhook retries abandoned on shutdown");
                    let last = outcome.error.take().unwrap_or_default();
                    outcome.error = Some(format!("{}; retries abandoned on shutdown", last));
                    return outcome;
                }
            }
        }
    }
}
