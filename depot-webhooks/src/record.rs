//! Delivery audit records

use crate::EventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Final outcome of one delivery sequence (all attempts included)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Last HTTP status observed, if any response arrived
    pub status_code: Option<u16>,

    /// Whether the endpoint answered with a 2xx
    pub success: bool,

    /// Error from the last failed attempt
    pub error: Option<String>,

    /// Number of HTTP attempts made
    pub attempts: u32,
}

impl DeliveryOutcome {
    /// Outcome for a delivery that never reached the network
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            status_code: None,
            success: false,
            error: Some(error.into()),
            attempts: 0,
        }
    }
}

/// Audit entry summarizing one delivery to one subscription.
///
/// Exactly one record is appended per (event, matching subscription) pair,
/// whatever the number of retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Subscription the payload was delivered to
    pub subscription_id: String,

    /// Kind of the delivered event
    pub event_kind: EventKind,

    /// HTTP status code from the last attempt that got a response
    pub status_code: Option<u16>,

    /// Whether delivery succeeded
    pub success: bool,

    /// Error message from the last failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Rendered request body
    pub payload: String,

    /// Number of HTTP attempts made
    pub attempts: u32,

    /// When the delivery sequence finished
    pub timestamp: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Build a record from a finished delivery
    pub fn new(
        subscription_id: impl Into<String>,
        event_kind: EventKind,
        payload: impl Into<String>,
        outcome: DeliveryOutcome,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            event_kind,
            status_code: outcome.status_code,
            success: outcome.success,
            error: outcome.error,
            payload: payload.into(),
            attempts: outcome.attempts,
            timestamp: Utc::now(),
        }
    }
}
