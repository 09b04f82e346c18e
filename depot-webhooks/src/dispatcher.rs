//! Webhook dispatcher
//!
//! Events are accepted into a bounded queue without ever blocking the
//! producer, and a fixed pool of tokio tasks delivers them to every matching
//! subscription of the event's repository.

use crate::client::{DeliveryClient, DeliveryRequest};
use crate::{
    DeliveryOutcome, DeliveryRecord, DispatcherConfig, Event, PayloadRenderer, Result,
    RetryPolicy, Subscription, SubscriptionStore, WebhookError, headers,
};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

/// Snapshot of dispatcher counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Events accepted into the queue
    pub accepted: u64,

    /// Events refused because the queue was full or shutdown had begun
    pub dropped: u64,

    /// Events taken off the queue (or dispatched inline) and processed
    pub dispatched_events: u64,

    /// Events abandoned because subscriptions could not be loaded
    pub lookup_failures: u64,

    /// Deliveries that ended with a 2xx
    pub deliveries_succeeded: u64,

    /// Deliveries that ended with any other outcome
    pub deliveries_failed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    dropped: AtomicU64,
    dispatched_events: AtomicU64,
    lookup_failures: AtomicU64,
    deliveries_succeeded: AtomicU64,
    deliveries_failed: AtomicU64,
}

impl Counters {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> DispatcherStats {
        DispatcherStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            dispatched_events: self.dispatched_events.load(Ordering::Relaxed),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            deliveries_succeeded: self.deliveries_succeeded.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
        }
    }
}

/// State shared by the dispatcher handle and its workers
struct Engine {
    store: Arc<dyn SubscriptionStore>,
    renderer: PayloadRenderer,
    client: DeliveryClient,
    retry_policy: RetryPolicy,
    counters: Counters,
}

impl Engine {
    /// Deliver one event to every enabled, matching subscription
    async fn process(
        &self,
        event: &Event,
        shutdown: &CancellationToken,
    ) -> Result<Vec<DeliveryRecord>> {
        Counters::incr(&self.counters.dispatched_events);

        let subscriptions = match self
            .store
            .list_subscriptions_by_repository(event.repository())
            .await
        {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                Counters::incr(&self.counters.lookup_failures);
                error!(
                    repository = %event.repository(),
                    kind = %event.kind(),
                    error = %e,
                    "failed to load subscriptions, abandoning event"
                );
                return Err(e);
            }
        };

        let mut records = Vec::new();
        for subscription in &subscriptions {
            if !subscription.enabled {
                debug!(subscription_id = %subscription.id, "skipping disabled subscription");
                continue;
            }
            if !subscription.parsed_filter().matches(event.kind()) {
                debug!(
                    subscription_id = %subscription.id,
                    kind = %event.kind(),
                    "event kind filtered out"
                );
                continue;
            }

            let record = self.deliver(subscription, event, shutdown).await;
            if record.success {
                Counters::incr(&self.counters.deliveries_succeeded);
            } else {
                Counters::incr(&self.counters.deliveries_failed);
            }

            if let Err(e) = self.store.append_delivery_record(record.clone()).await {
                error!(
                    subscription_id = %subscription.id,
                    error = %e,
                    "failed to append delivery record"
                );
            }
            records.push(record);
        }

        Ok(records)
    }

    async fn deliver(
        &self,
        subscription: &Subscription,
        event: &Event,
        shutdown: &CancellationToken,
    ) -> DeliveryRecord {
        let payload = match self.renderer.render(event, subscription.template()) {
            Ok(payload) => payload,
            Err(e) => {
                error!(subscription_id = %subscription.id, error = %e, "failed to encode payload");
                return DeliveryRecord::new(
                    &subscription.id,
                    event.kind(),
                    String::new(),
                    DeliveryOutcome::rejected(e.to_string()),
                );
            }
        };

        let url = match parse_endpoint(&subscription.url) {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    url = %subscription.url,
                    error = %e,
                    "subscription has an unusable URL"
                );
                return DeliveryRecord::new(
                    &subscription.id,
                    event.kind(),
                    payload,
                    DeliveryOutcome::rejected(e.to_string()),
                );
            }
        };

        let delivery_id = Uuid::new_v4().to_string();
        let request = DeliveryRequest {
            url,
            headers: headers::assemble(subscription, event, payload.as_bytes(), &delivery_id),
            body: payload,
        };

        debug!(
            subscription_id = %subscription.id,
            delivery_id = %delivery_id,
            kind = %event.kind(),
            "delivering webhook"
        );
        let outcome = self
            .retry_policy
            .execute(&self.client, &request, shutdown)
            .await;

        DeliveryRecord::new(&subscription.id, event.kind(), request.body, outcome)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(WebhookError::UnsupportedScheme(scheme.to_string())),
    }
}

/// Asynchronous, best-effort webhook dispatcher.
///
/// `enqueue` may be called from any thread while workers run. Once `stop` has
/// begun, no further events are accepted.
pub struct Dispatcher {
    config: DispatcherConfig,
    engine: Arc<Engine>,
    sender: RwLock<Option<mpsc::Sender<Event>>>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Event>>>,
    accepting: AtomicBool,
    started: AtomicBool,
    workers: Mutex<Vec<JoinHandle<()>>>,
    // Held for the whole of `stop` so concurrent callers wait for one drain.
    stopping: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("accepting", &self.accepting.load(Ordering::Relaxed))
            .field("started", &self.started.load(Ordering::Relaxed))
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher. The queue accepts events immediately; they are
    /// delivered once [`Dispatcher::start`] runs the workers.
    pub fn new(config: DispatcherConfig, store: Arc<dyn SubscriptionStore>) -> Result<Self> {
        let config = config.normalized();
        let client = DeliveryClient::from_config(&config)?;
        let (sender, receiver) = mpsc::channel(config.queue_capacity);

        let engine = Engine {
            store,
            renderer: PayloadRenderer::new(),
            client,
            retry_policy: config.retry_policy(),
            counters: Counters::default(),
        };

        Ok(Self {
            config,
            engine: Arc::new(engine),
            sender: RwLock::new(Some(sender)),
            receiver: Arc::new(tokio::sync::Mutex::new(receiver)),
            accepting: AtomicBool::new(true),
            started: AtomicBool::new(false),
            workers: Mutex::new(Vec::new()),
            stopping: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
        })
    }

    /// Effective configuration
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Spawn the worker pool; `0` uses the configured worker count.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, worker_count: usize) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(WebhookError::AlreadyStarted);
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|e| {
            self.started.store(false, Ordering::Release);
            WebhookError::Internal(format!("no tokio runtime: {}", e))
        })?;

        let worker_count = if worker_count == 0 {
            self.config.workers
        } else {
            worker_count
        };

        let mut workers = self.workers.lock();
        for worker_id in 0..worker_count {
            let engine = Arc::clone(&self.engine);
            let receiver = Arc::clone(&self.receiver);
            let shutdown = self.shutdown.clone();
            workers.push(runtime.spawn(run_worker(worker_id, engine, receiver, shutdown)));
        }

        info!(workers = worker_count, "webhook dispatcher started");
        Ok(())
    }

    /// Offer an event without blocking.
    ///
    /// Returns `false` when the event was dropped because the queue is full
    /// or shutdown has begun.
    pub fn enqueue(&self, event: Event) -> bool {
        if !self.accepting.load(Ordering::Acquire) {
            Counters::incr(&self.engine.counters.dropped);
            debug!(repository = %event.repository(), "dispatcher stopped, dropping event");
            return false;
        }

        let sender = self.sender.read();
        let Some(sender) = sender.as_ref() else {
            Counters::incr(&self.engine.counters.dropped);
            debug!(repository = %event.repository(), "dispatcher stopped, dropping event");
            return false;
        };

        match sender.try_send(event) {
            Ok(()) => {
                Counters::incr(&self.engine.counters.accepted);
                true
            }
            Err(TrySendError::Full(event)) => {
                Counters::incr(&self.engine.counters.dropped);
                warn!(
                    repository = %event.repository(),
                    kind = %event.kind(),
                    capacity = self.config.queue_capacity,
                    "webhook queue full, dropping event"
                );
                false
            }
            Err(TrySendError::Closed(event)) => {
                Counters::incr(&self.engine.counters.dropped);
                debug!(repository = %event.repository(), "webhook queue closed, dropping event");
                false
            }
        }
    }

    /// Deliver an event on the caller's task, bypassing the queue.
    ///
    /// Returns [`WebhookError::Stopped`] once [`Dispatcher::stop`] has begun.
    pub async fn dispatch(&self, event: &Event) -> Result<Vec<DeliveryRecord>> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(WebhookError::Stopped);
        }
        self.engine.process(event, &self.shutdown).await
    }

    /// Stop accepting events and wait for the workers to drain the queue.
    ///
    /// When `grace` elapses first, pending backoff sleeps are cancelled, the
    /// remaining queued events are abandoned, and
    /// [`WebhookError::ShutdownTimeout`] is returned once the workers exit.
    ///
    /// Concurrent calls wait for the first one to finish draining.
    pub async fn stop(&self, grace: Duration) -> Result<()> {
        self.accepting.store(false, Ordering::Release);
        // No producer can hold the read lock past this point.
        self.sender.write().take();

        let _stopping = self.stopping.lock().await;
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.workers.lock());
        if handles.is_empty() {
            if !self.started.load(Ordering::Acquire) {
                self.shutdown.cancel();
            }
            return Ok(());
        }

        info!(workers = handles.len(), "stopping webhook dispatcher");
        let mut joined = Box::pin(join_all(handles));
        let result = match tokio::time::timeout(grace, joined.as_mut()).await {
            Ok(results) => {
                log_join_errors(results);
                Ok(())
            }
            Err(_) => {
                warn!(grace = ?grace, "shutdown grace period elapsed, cancelling deliveries");
                self.shutdown.cancel();
                log_join_errors(joined.await);
                Err(WebhookError::ShutdownTimeout { grace })
            }
        };

        info!(stats = ?self.stats(), "webhook dispatcher stopped");
        result
    }

    /// Whether the dispatcher still accepts events
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    /// Number of events waiting in the queue
    pub fn pending(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map(|sender| sender.max_capacity() - sender.capacity())
            .unwrap_or(0)
    }

    /// Current counters
    pub fn stats(&self) -> DispatcherStats {
        self.engine.counters.snapshot()
    }
}

fn log_join_errors(results: Vec<std::result::Result<(), tokio::task::JoinError>>) {
    for e in results.into_iter().filter_map(|r| r.err()) {
        error!(error = %e, "webhook worker terminated abnormally");
    }
}

async fn run_worker(
    worker_id: usize,
    engine: Arc<Engine>,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Event>>>,
    shutdown: CancellationToken,
) {
    debug!(worker_id, "webhook worker started");

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = async { receiver.lock().await.recv().await } => event,
        };

        let Some(event) = next else {
            break;
        };

        // Lookup failures are logged and counted by the engine.
        let _ = engine.process(&event, &shutdown).await;
    }

    debug!(worker_id, "webhook worker stopped");
}
