// Depot - artifact repository services for Rust
//
// This library bundles the Depot service crates behind feature flags.

// Re-export optional crates
#[cfg(feature = "webhooks")]
pub use depot_webhooks;

#[cfg(feature = "log")]
pub use depot_log;

/// Prelude for common imports.
///
/// ```
/// use depot::prelude::*;
/// ```
pub mod prelude {
    #[cfg(feature = "webhooks")]
    pub use depot_webhooks::{
        DeliveryRecord, Dispatcher, DispatcherConfig, DispatcherStats, Event, EventKind,
        MemoryStore, Subscription, SubscriptionStore, WebhookError, WebhookSignature,
    };

    #[cfg(feature = "log")]
    pub use depot_log::{Format as LogFormat, Level as LogLevel, LogConfig};
}
