//! Webhook Dispatch for Depot
//!
//! This crate notifies external HTTP endpoints about artifact lifecycle events
//! in a Depot repository: an artifact was added, removed or changed.
//!
//! # Features
//!
//! - **Non-blocking Enqueue**: Bounded queue, events are dropped (and counted) when full
//! - **Worker Pool**: A fixed number of tokio tasks deliver events concurrently
//! - **Payload Templates**: Handlebars templates with a canonical JSON fallback
//! - **Signature Headers**: HMAC-SHA256 signing of every payload
//! - **Automatic Retries**: Exponential backoff on transport errors and 5xx responses
//! - **Delivery Audit**: Exactly one record per event and matching subscription
//! - **Graceful Shutdown**: Drain the queue within a grace period
//!
//! # Example
//!
//! ```rust,no_run
//! use depot_webhooks::{Dispatcher, DispatcherConfig, Event, MemoryStore, Subscription};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MemoryStore::new();
//!     store.register(
//!         Subscription::builder("maven-releases", "https://ci.example.com/hooks/depot")
//!             .events(&["add", "remove"])
//!             .secret("shared-secret")
//!             .build(),
//!     );
//!
//!     let dispatcher = Dispatcher::new(DispatcherConfig::default(), Arc::new(store))?;
//!     dispatcher.start(0)?;
//!
//!     dispatcher.enqueue(
//!         Event::added("maven-releases", "com/acme/lib/1.0/lib-1.0.jar")
//!             .with_group("com.acme")
//!             .with_name("lib")
//!             .with_version("1.0"),
//!     );
//!
//!     dispatcher.stop(Duration::from_secs(30)).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Example: Verifying a Delivery
//!
//! ```rust
//! use depot_webhooks::WebhookSignature;
//!
//! let signer = WebhookSignature::new("shared-secret");
//! let body = br#"{"kind":"add"}"#;
//! let header = signer.sign(body);
//!
//! assert!(header.starts_with("sha256="));
//! assert!(signer.verify(body, &header));
//! ```

#![warn(missing_docs)]

mod client;
mod config;
mod dispatcher;
mod error;
mod event;
pub mod headers;
mod record;
mod render;
mod retry;
mod signature;
mod store;
mod subscription;

pub use client::{AttemptOutcome, DeliveryClient, DeliveryRequest, StatusClass};
pub use config::{
    DEFAULT_HTTP_TIMEOUT, DEFAULT_INITIAL_BACKOFF, DEFAULT_MAX_BACKOFF, DEFAULT_MAX_RETRIES,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_WORKERS, DispatcherConfig, DispatcherConfigBuilder,
    ENV_PREFIX,
};
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use error::WebhookError;
pub use event::{Event, EventKind};
pub use record::{DeliveryOutcome, DeliveryRecord};
pub use render::PayloadRenderer;
pub use retry::RetryPolicy;
pub use signature::{WebhookSignature, headers as header_names};
pub use store::{MemoryStore, SubscriptionStore};
pub use subscription::{EventFilter, Subscription, SubscriptionBuilder};

/// Result type for webhook operations
pub type Result<T> = std::result::Result<T, WebhookError>;
