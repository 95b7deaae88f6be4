//! Subscription lifecycle management.
//!
//! This module contains the SubscriptionManager which handles:
//! - Attaching to every configured subscription on start
//! - Pumping each subscription's events into its dispatcher and error recovery
//! - Closing every tracked subscription exactly once on stop

use std::sync::Arc;
use std::time::SystemTime;

use broker_client::{
    BrokerClient, EventReceiver, SubscriptionEvent, SubscriptionHandle,
};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::dispatch::MessageDispatcher;
use super::recovery::ErrorRecovery;
use super::shutdown::ShutdownSignal;
use crate::config::SubscriptionManagerConfig;
use crate::error::{Result, StreamError};
use crate::registry::HandlerLookup;
use crate::sink::{ErrorSink, TracingErrorSink};

/// Subscription state tracked by the manager.
pub struct ActiveSubscription {
    /// The subscription id this handle is attached to
    pub id: String,
    /// The live broker handle
    pub handle: Arc<dyn SubscriptionHandle>,
    /// When the handle was created
    pub created_at: SystemTime,
    pump: JoinHandle<()>,
}

impl ActiveSubscription {
    fn new(id: String, handle: Arc<dyn SubscriptionHandle>, pump: JoinHandle<()>) -> Self {
        Self {
            id,
            handle,
            created_at: SystemTime::now(),
            pump,
        }
    }

    /// Whether the event pump for this subscription is still running.
    pub fn is_pumping(&self) -> bool {
        !self.pump.is_finished()
    }
}

/// Owns the lifecycle of a fixed set of broker subscriptions.
///
/// On [`start`](Self::start) it attaches to every configured subscription and
/// routes inbound messages through a [`MessageDispatcher`]. Broker errors go
/// through an [`ErrorRecovery`], which closes and later reopens a subscription
/// on transient failures. [`stop`](Self::stop) sets the shutting-down flag
/// before closing anything, so no error raised by the closes triggers a
/// reopen.
///
/// The manager is restartable: `start` after `stop` attaches again under a
/// fresh shutdown signal. Reopen timers armed before the `stop` keep the old,
/// triggered signal and never fire.
pub struct SubscriptionManager {
    client: Arc<dyn BrokerClient>,
    lookup: Arc<dyn HandlerLookup>,
    error_sink: Arc<dyn ErrorSink>,
    config: SubscriptionManagerConfig,
    subscriptions: Mutex<Vec<ActiveSubscription>>,
    shutdown: SyncMutex<ShutdownSignal>,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    ///
    /// # Arguments
    ///
    /// * `client` - Broker client used to attach to subscriptions
    /// * `lookup` - Maps routing patterns to message handlers
    /// * `config` - Subscriptions to manage and how to route and recover them
    ///
    /// Errors are reported through [`TracingErrorSink`] unless another sink is
    /// installed with [`with_error_sink`](Self::with_error_sink).
    pub fn new(
        client: Arc<dyn BrokerClient>,
        lookup: Arc<dyn HandlerLookup>,
        config: SubscriptionManagerConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            client,
            lookup,
            error_sink: Arc::new(TracingErrorSink),
            config,
            subscriptions: Mutex::new(Vec::new()),
            shutdown: SyncMutex::new(ShutdownSignal::new()),
        })
    }

    /// Replace the error sink.
    pub fn with_error_sink(mut self, error_sink: Arc<dyn ErrorSink>) -> Self {
        self.error_sink = error_sink;
        self
    }

    /// Attach to every configured subscription.
    ///
    /// After a `stop`, a new shutdown signal replaces the triggered one, so
    /// handles from the earlier generation are never reopened. If a subscribe
    /// call fails, the
    /// error is returned and the subscriptions attached before it stay tracked,
    /// so a later [`stop`](Self::stop) closes them.
    ///
    /// Calling `start` while already started attaches a second time. The
    /// earlier handles stay open and tracked until the next `stop`.
    pub async fn start(&self) -> Result<()> {
        let shutdown = {
            let mut current = self.shutdown.lock();
            if current.is_set() {
                *current = ShutdownSignal::new();
            }
            current.clone()
        };

        let mut subscriptions = self.subscriptions.lock().await;
        if !subscriptions.is_empty() {
            tracing::warn!(
                active = subscriptions.len(),
                "start called while subscriptions are active, attaching again"
            );
        }

        for id in &self.config.subscription_ids {
            let handle = self
                .client
                .subscribe(id, &self.config.subscriber_options)
                .await?;
            let events = handle
                .take_events()
                .ok_or_else(|| StreamError::EventStreamUnavailable(id.clone()))?;

            let pump = tokio::spawn(pump_events(
                events,
                Arc::new(self.message_dispatcher(id)),
                self.error_recovery(handle.clone(), id),
                shutdown.clone(),
            ));

            tracing::debug!(subscription = %id, "subscription attached");
            subscriptions.push(ActiveSubscription::new(id.clone(), handle, pump));
        }

        tracing::info!(
            count = self.config.subscription_ids.len(),
            "subscriptions started"
        );
        Ok(())
    }

    /// Close every tracked subscription.
    ///
    /// Sets the shutting-down flag before the first close. Each tracked handle
    /// is closed exactly once by `stop` and the collection is cleared. A close
    /// made earlier by error recovery is not counted. Individual close failures
    /// are logged, not returned. Every event pump is ended after the closes,
    /// whether or not the broker sent a close event. In-flight message handlers
    /// are not awaited.
    pub async fn stop(&self) -> Result<()> {
        self.shutdown_signal().trigger().await;

        let drained: Vec<ActiveSubscription> =
            self.subscriptions.lock().await.drain(..).collect();

        let closes = drained.iter().map(|subscription| async move {
            (subscription.id.as_str(), subscription.handle.close().await)
        });
        for (id, result) in futures::future::join_all(closes).await {
            if let Err(e) = result {
                tracing::warn!(subscription = %id, "failed to close subscription: {}", e);
            }
        }

        let count = drained.len();
        for subscription in drained {
            subscription.pump.abort();
            if let Err(e) = subscription.pump.await {
                if e.is_panic() {
                    tracing::warn!(subscription = %subscription.id, "event pump panicked: {}", e);
                }
            }
        }

        tracing::info!(count, "subscriptions stopped");
        Ok(())
    }

    /// Build the dispatch callback for a subscription.
    pub fn message_dispatcher(&self, subscription_id: &str) -> MessageDispatcher {
        MessageDispatcher::new(
            subscription_id,
            self.config.pattern_source.clone(),
            self.lookup.clone(),
        )
    }

    /// Build the error callback for a subscription handle.
    pub fn error_recovery(
        &self,
        handle: Arc<dyn SubscriptionHandle>,
        subscription_id: &str,
    ) -> ErrorRecovery {
        ErrorRecovery::new(
            subscription_id,
            handle,
            self.shutdown_signal(),
            self.error_sink.clone(),
            self.config.recovery_policy.clone(),
        )
    }

    /// Whether the current generation has been stopped.
    ///
    /// False before the first `start`, true from the moment `stop` begins
    /// until the next `start`.
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.lock().is_set()
    }

    fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.lock().clone()
    }

    /// Number of tracked subscription handles.
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.lock().await.len()
    }

    /// Ids of the tracked subscription handles, in attach order.
    pub async fn subscription_ids(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .await
            .iter()
            .map(|s| s.id.clone())
            .collect()
    }

    /// The validated configuration this manager was built with.
    pub fn config(&self) -> &SubscriptionManagerConfig {
        &self.config
    }
}

/// Drive one subscription's event channel until it closes for shutdown.
async fn pump_events(
    mut events: EventReceiver,
    dispatcher: Arc<MessageDispatcher>,
    recovery: ErrorRecovery,
    shutdown: ShutdownSignal,
) {
    while let Some(event) = events.recv().await {
        match event {
            SubscriptionEvent::Message(message) => {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher.dispatch(message).await;
                });
            }
            SubscriptionEvent::Error(error) => {
                recovery.handle_error(error).await;
            }
            SubscriptionEvent::Close => {
                if shutdown.is_set() {
                    break;
                }
                tracing::debug!(
                    subscription = %dispatcher.subscription_id(),
                    "subscription closed, waiting for reopen"
                );
            }
        }
    }

    tracing::debug!(subscription = %dispatcher.subscription_id(), "event pump finished");
}
