//! Subscription store contract and an in-memory implementation

use crate::{DeliveryRecord, Result, Subscription, WebhookError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Persistence collaborator of the dispatcher.
///
/// Implementations must tolerate concurrent calls from every worker; each
/// call is expected to be atomic on its own.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// List every subscription registered for a repository
    async fn list_subscriptions_by_repository(&self, repository: &str)
    -> Result<Vec<Subscription>>;

    /// Append a record to the delivery audit log
    async fn append_delivery_record(&self, record: DeliveryRecord) -> Result<()>;
}

/// In-memory subscription store and audit log
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    subscriptions: Arc<RwLock<HashMap<String, Subscription>>>,
    records: Arc<RwLock<Vec<DeliveryRecord>>>,
    fail_lookups: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription, replacing any with the same ID
    pub fn register(&self, subscription: Subscription) -> String {
        let id = subscription.id.clone();
        self.subscriptions.write().insert(id.clone(), subscription);
        id
    }

    /// Remove a subscription by ID
    pub fn unregister(&self, id: &str) -> Option<Subscription> {
        self.subscriptions.write().remove(id)
    }

    /// Get a subscription by ID
    pub fn get(&self, id: &str) -> Option<Subscription> {
        self.subscriptions.read().get(id).cloned()
    }

    /// Number of registered subscriptions
    pub fn count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Snapshot of the audit log, in append order
    pub fn records(&self) -> Vec<DeliveryRecord> {
        self.records.read().clone()
    }

    /// Audit entries for one subscription
    pub fn records_for(&self, subscription_id: &str) -> Vec<DeliveryRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.subscription_id == subscription_id)
            .cloned()
            .collect()
    }

    /// Number of audit entries
    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    /// Drop every audit entry
    pub fn clear_records(&self) {
        self.records.write().clear();
    }

    /// Make subscription lookups fail, simulating an unavailable store
    pub fn fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn list_subscriptions_by_repository(
        &self,
        repository: &str,
    ) -> Result<Vec<Subscription>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(WebhookError::StoreError(
                "subscription store unavailable".to_string(),
            ));
        }

        let mut subscriptions: Vec<Subscription> = self
            .subscriptions
            .read()
            .values()
            .filter(|s| s.repository == repository)
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(subscriptions)
    }

    async fn append_delivery_record(&self, record: DeliveryRecord) -> Result<()> {
        self.records.write().push(record);
        Ok(())
    }
}
