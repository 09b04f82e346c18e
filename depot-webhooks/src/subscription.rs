//! Webhook subscription configuration

use crate::EventKind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;
use uuid::Uuid;

/// A webhook subscription registered against a repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Unique subscription ID
    pub id: String,

    /// Repository whose events are delivered
    pub repository: String,

    /// Target URL for webhook delivery
    pub url: String,

    /// Whether this subscription is active
    pub enabled: bool,

    /// Event kinds to deliver; empty means all kinds
    #[serde(default)]
    pub event_filter: Vec<String>,

    /// Optional Handlebars template for the request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_template: Option<String>,

    /// Custom headers as a JSON object of string values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<String>,

    /// Secret used to sign the payload
    #[serde(default, skip_serializing)]
    pub signing_secret: Option<String>,

    /// Bearer token for the Authorization header
    #[serde(default, skip_serializing)]
    pub bearer_token: Option<String>,

    /// Basic auth username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basic_username: Option<String>,

    /// Basic auth password
    #[serde(default, skip_serializing)]
    pub basic_password: Option<String>,
}

impl Subscription {
    /// Create an enabled subscription matching every event kind
    pub fn new(repository: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            repository: repository.into(),
            url: url.into(),
            enabled: true,
            event_filter: Vec::new(),
            payload_template: None,
            headers: None,
            signing_secret: None,
            bearer_token: None,
            basic_username: None,
            basic_password: None,
        }
    }

    /// Create a builder for custom configuration
    pub fn builder(repository: impl Into<String>, url: impl Into<String>) -> SubscriptionBuilder {
        SubscriptionBuilder::new(repository, url)
    }

    /// Parse the raw filter strings into a set of kinds
    pub fn parsed_filter(&self) -> EventFilter {
        EventFilter::parse(&self.event_filter)
    }

    /// Decode the custom header mapping.
    ///
    /// Missing, blank or malformed JSON yields an empty map.
    pub fn custom_headers(&self) -> HashMap<String, String> {
        let Some(raw) = self.headers.as_deref() else {
            return HashMap::new();
        };
        if raw.trim().is_empty() {
            return HashMap::new();
        }

        match serde_json::from_str::<HashMap<String, String>>(raw) {
            Ok(headers) => headers,
            Err(e) => {
                warn!(subscription_id = %self.id, error = %e, "ignoring malformed custom headers");
                HashMap::new()
            }
        }
    }

    /// Template to render, if one is set and not blank
    pub fn template(&self) -> Option<&str> {
        self.payload_template
            .as_deref()
            .filter(|template| !template.trim().is_empty())
    }
}

/// Normalized event filter of a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// No filter configured, every kind matches
    All,

    /// Only the listed kinds match (possibly none)
    Only(BTreeSet<EventKind>),
}

impl EventFilter {
    /// Parse raw filter entries.
    ///
    /// Each entry may itself hold a comma separated list. Blank entries are
    /// skipped, unknown names are ignored.
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Self {
        let names: Vec<&str> = entries
            .iter()
            .flat_map(|entry| entry.as_ref().split(','))
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() {
            return Self::All;
        }

        let mut kinds = BTreeSet::new();
        for name in names {
            match EventKind::parse(name) {
                Some(kind) => {
                    kinds.insert(kind);
                }
                None => warn!(entry = name, "unknown event kind in subscription filter"),
            }
        }
        Self::Only(kinds)
    }

    /// Parse a single comma separated filter string
    pub fn from_csv(csv: &str) -> Self {
        Self::parse(&[csv])
    }

    /// Check whether an event kind passes this filter
    pub fn matches(&self, kind: EventKind) -> bool {
        match self {
            Self::All => true,
            Self::Only(kinds) => kinds.contains(&kind),
        }
    }
}

/// Builder for Subscription
#[derive(Debug, Clone)]
pub struct SubscriptionBuilder {
    subscription: Subscription,
}

impl SubscriptionBuilder {
    /// Create a new builder
    pub fn new(repository: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            subscription: Subscription::new(repository, url),
        }
    }

    /// Set a fixed ID
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.subscription.id = id.into();
        self
    }

    /// Enable or disable the subscription
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.subscription.enabled = enabled;
        self
    }

    /// Restrict delivery to the given kinds
    pub fn events(mut self, events: &[&str]) -> Self {
        self.subscription.event_filter = events.iter().map(|e| e.to_string()).collect();
        self
    }

    /// Set the payload template
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.subscription.payload_template = Some(template.into());
        self
    }

    /// Set the custom header JSON
    pub fn headers_json(mut self, headers: impl Into<String>) -> Self {
        self.subscription.headers = Some(headers.into());
        self
    }

    /// Set custom headers from pairs
    pub fn headers(mut self, headers: &[(&str, &str)]) -> Self {
        let map: HashMap<&str, &str> = headers.iter().copied().collect();
        self.subscription.headers = serde_json::to_string(&map).ok();
        self
    }

    /// Set the signing secret
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.subscription.signing_secret = Some(secret.into());
        self
    }

    /// Set the bearer token
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.subscription.bearer_token = Some(token.into());
        self
    }

    /// Set basic auth credentials
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.subscription.basic_username = Some(username.into());
        self.subscription.basic_password = Some(password.into());
        self
    }

    /// Build the subscription
    pub fn build(self) -> Subscription {
        self.subscription
    }
}
