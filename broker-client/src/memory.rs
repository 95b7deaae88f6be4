//! In-process broker.
//!
//! `MemoryBroker` implements [`BrokerClient`] without any network I/O. Topics
//! fan published messages out to the subscriptions attached to them, closed
//! handles hold messages back until they are reopened, and nacked messages are
//! redelivered. Test hooks allow injecting subscription errors and publish
//! failures and inspecting close/open/ack activity.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::client::{BrokerClient, SubscriptionHandle, TopicHandle};
use crate::error::{BrokerError, Result, StatusCode};
use crate::message::{
    Acknowledger, Attributes, EventReceiver, EventSender, InboundMessage, SubscriptionEvent,
};
use crate::options::{PublishOptions, SubscriberOptions};

/// A message accepted by a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub id: String,
    pub data: Bytes,
    pub attributes: Attributes,
}

#[derive(Debug, Clone)]
struct Pending {
    id: String,
    data: Bytes,
    attributes: Attributes,
    attempt: u32,
}

#[derive(Default)]
struct TopicState {
    subscriptions: Vec<String>,
    published: Vec<PublishedMessage>,
    failures: VecDeque<StatusCode>,
}

/// Broker-side state of one subscription.
struct SubscriptionState {
    name: String,
    handles: Mutex<Vec<Arc<MemoryHandle>>>,
    backlog: Mutex<VecDeque<Pending>>,
    outstanding: Mutex<HashMap<String, Pending>>,
    acked: Mutex<Vec<String>>,
    nacked: Mutex<Vec<String>>,
    last_options: Mutex<Option<SubscriberOptions>>,
}

impl SubscriptionState {
    fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            handles: Mutex::new(Vec::new()),
            backlog: Mutex::new(VecDeque::new()),
            outstanding: Mutex::new(HashMap::new()),
            acked: Mutex::new(Vec::new()),
            nacked: Mutex::new(Vec::new()),
            last_options: Mutex::new(None),
        })
    }

    fn open_handle(&self) -> Option<Arc<MemoryHandle>> {
        self.handles.lock().iter().find(|h| h.is_open()).cloned()
    }

    fn deliver(self: &Arc<Self>, pending: Pending) {
        let Some(handle) = self.open_handle() else {
            tracing::debug!(subscription = %self.name, id = %pending.id, "no open handle, holding message");
            self.backlog.lock().push_back(pending);
            return;
        };

        let acknowledger: Arc<dyn Acknowledger> = self.clone();
        let message = InboundMessage::new(
            pending.id.clone(),
            pending.data.clone(),
            pending.attributes.clone(),
            acknowledger,
        )
        .with_delivery_attempt(pending.attempt);

        self.outstanding.lock().insert(pending.id.clone(), pending);
        handle.emit(SubscriptionEvent::Message(message));
    }

    fn flush_backlog(self: &Arc<Self>) {
        let held: Vec<Pending> = self.backlog.lock().drain(..).collect();
        for pending in held {
            self.deliver(pending);
        }
    }
}

impl Acknowledger for SubscriptionState {
    fn ack(&self, message_id: &str) {
        self.outstanding.lock().remove(message_id);
        self.acked.lock().push(message_id.to_string());
    }

    fn nack(&self, message_id: &str) {
        self.nacked.lock().push(message_id.to_string());
        let Some(mut pending) = self.outstanding.lock().remove(message_id) else {
            return;
        };
        pending.attempt += 1;
        self.backlog.lock().push_back(pending);
        // `deliver` needs the Arc, which the open handle holds.
        if let Some(handle) = self.open_handle() {
            handle.subscription.flush_backlog();
        }
    }
}

/// One attachment to a subscription, returned by [`MemoryBroker::subscribe`].
pub struct MemoryHandle {
    subscription: Arc<SubscriptionState>,
    events_tx: EventSender,
    events_rx: Mutex<Option<EventReceiver>>,
    open: AtomicBool,
    close_calls: AtomicU32,
    open_calls: AtomicU32,
}

impl MemoryHandle {
    fn new(subscription: Arc<SubscriptionState>) -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            subscription,
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
            open: AtomicBool::new(true),
            close_calls: AtomicU32::new(0),
            open_calls: AtomicU32::new(0),
        })
    }

    fn emit(&self, event: SubscriptionEvent) {
        // The receiver may already be gone once the consumer shut down.
        let _ = self.events_tx.send(event);
    }

    /// Number of `close()` calls made on this handle.
    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    /// Number of `open()` calls made on this handle.
    pub fn open_calls(&self) -> u32 {
        self.open_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriptionHandle for MemoryHandle {
    fn name(&self) -> &str {
        &self.subscription.name
    }

    fn take_events(&self) -> Option<EventReceiver> {
        self.events_rx.lock().take()
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        self.emit(SubscriptionEvent::Close);
        Ok(())
    }

    async fn open(&self) -> Result<()> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);
        self.subscription.flush_backlog();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

struct BrokerState {
    subscriptions: DashMap<String, Arc<SubscriptionState>>,
    topics: DashMap<String, TopicState>,
    next_id: AtomicU64,
}

impl BrokerState {
    fn subscription(&self, name: &str) -> Arc<SubscriptionState> {
        self.subscriptions
            .entry(name.to_string())
            .or_insert_with(|| SubscriptionState::new(name))
            .clone()
    }

    fn next_message_id(&self) -> String {
        (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn take_failure(&self, topic: &str) -> Option<StatusCode> {
        self.topics.get_mut(topic)?.failures.pop_front()
    }

    fn accept(&self, topic: &str, data: Bytes, attributes: Attributes) -> String {
        let id = self.next_message_id();
        let targets = {
            let mut state = self.topics.entry(topic.to_string()).or_default();
            state.published.push(PublishedMessage {
                id: id.clone(),
                data: data.clone(),
                attributes: attributes.clone(),
            });
            state.subscriptions.clone()
        };

        for name in targets {
            self.subscription(&name).deliver(Pending {
                id: id.clone(),
                data: data.clone(),
                attributes: attributes.clone(),
                attempt: 1,
            });
        }
        id
    }
}

/// In-process [`BrokerClient`].
#[derive(Clone)]
pub struct MemoryBroker {
    state: Arc<BrokerState>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self {
            state: Arc::new(BrokerState {
                subscriptions: DashMap::new(),
                topics: DashMap::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Declare a subscription attached to `topic`.
    pub fn create_subscription(&self, name: &str, topic: &str) {
        self.state.subscription(name);
        let mut state = self.state.topics.entry(topic.to_string()).or_default();
        if !state.subscriptions.iter().any(|s| s == name) {
            state.subscriptions.push(name.to_string());
        }
    }

    /// Deliver a message straight to a subscription, bypassing topics.
    pub fn deliver(&self, subscription: &str, data: impl Into<Bytes>, attributes: Attributes) -> String {
        let id = self.state.next_message_id();
        self.state.subscription(subscription).deliver(Pending {
            id: id.clone(),
            data: data.into(),
            attributes,
            attempt: 1,
        });
        id
    }

    /// Emit an error event on every handle attached to `subscription`.
    pub fn inject_error(&self, subscription: &str, error: BrokerError) {
        for handle in self.handles(subscription) {
            handle.emit(SubscriptionEvent::Error(error.clone()));
        }
    }

    /// Make the next publishes to `topic` fail with `codes`, in order.
    pub fn fail_next_publishes(&self, topic: &str, codes: impl IntoIterator<Item = StatusCode>) {
        self.state
            .topics
            .entry(topic.to_string())
            .or_default()
            .failures
            .extend(codes);
    }

    /// Every handle returned by `subscribe` for `subscription`, oldest first.
    pub fn handles(&self, subscription: &str) -> Vec<Arc<MemoryHandle>> {
        self.state
            .subscriptions
            .get(subscription)
            .map(|s| s.handles.lock().clone())
            .unwrap_or_default()
    }

    /// Total `close()` calls across the subscription's handles.
    pub fn close_calls(&self, subscription: &str) -> u32 {
        self.handles(subscription).iter().map(|h| h.close_calls()).sum()
    }

    /// Total `open()` calls across the subscription's handles.
    pub fn open_calls(&self, subscription: &str) -> u32 {
        self.handles(subscription).iter().map(|h| h.open_calls()).sum()
    }

    /// Ids acked on `subscription`, in ack order.
    pub fn acked(&self, subscription: &str) -> Vec<String> {
        self.state
            .subscriptions
            .get(subscription)
            .map(|s| s.acked.lock().clone())
            .unwrap_or_default()
    }

    /// Ids nacked on `subscription`, in nack order.
    pub fn nacked(&self, subscription: &str) -> Vec<String> {
        self.state
            .subscriptions
            .get(subscription)
            .map(|s| s.nacked.lock().clone())
            .unwrap_or_default()
    }

    /// Messages held back because no handle was open.
    pub fn backlog_len(&self, subscription: &str) -> usize {
        self.state
            .subscriptions
            .get(subscription)
            .map(|s| s.backlog.lock().len())
            .unwrap_or_default()
    }

    /// Options passed on the most recent `subscribe` for `subscription`.
    pub fn subscriber_options(&self, subscription: &str) -> Option<SubscriberOptions> {
        self.state
            .subscriptions
            .get(subscription)
            .and_then(|s| s.last_options.lock().clone())
    }

    /// Messages accepted by `topic`.
    pub fn published(&self, topic: &str) -> Vec<PublishedMessage> {
        self.state
            .topics
            .get(topic)
            .map(|t| t.published.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BrokerClient for MemoryBroker {
    async fn subscribe(
        &self,
        name: &str,
        options: &SubscriberOptions,
    ) -> Result<Arc<dyn SubscriptionHandle>> {
        if name.is_empty() {
            return Err(BrokerError::new(
                StatusCode::InvalidArgument,
                "subscription name must not be empty",
            ));
        }

        let subscription = self.state.subscription(name);
        *subscription.last_options.lock() = Some(options.clone());

        let handle = MemoryHandle::new(subscription.clone());
        subscription.handles.lock().push(handle.clone());
        subscription.flush_backlog();

        tracing::debug!(subscription = %name, "memory broker attached handle");
        Ok(handle)
    }

    fn topic(&self, name: &str, options: &PublishOptions) -> Arc<dyn TopicHandle> {
        Arc::new(MemoryTopic {
            name: name.to_string(),
            options: options.clone(),
            state: self.state.clone(),
        })
    }
}

/// Topic handle of the in-process broker.
pub struct MemoryTopic {
    name: String,
    options: PublishOptions,
    state: Arc<BrokerState>,
}

#[async_trait]
impl TopicHandle for MemoryTopic {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, data: Bytes, attributes: Attributes) -> Result<String> {
        let retry = &self.options.retry;
        let mut delays = retry.backoff.delays();
        let mut waited = Duration::ZERO;

        loop {
            let Some(code) = self.state.take_failure(&self.name) else {
                return Ok(self.state.accept(&self.name, data, attributes));
            };

            let error = BrokerError::new(code, format!("publish to {} failed", self.name));
            if !retry.is_retryable(code) {
                return Err(error);
            }

            let delay = delays.next().unwrap_or(retry.backoff.max_retry_delay);
            if waited + delay > retry.backoff.total_timeout {
                tracing::warn!(topic = %self.name, %code, "publish retry budget exhausted");
                return Err(error);
            }

            tracing::debug!(topic = %self.name, %code, ?delay, "retrying publish");
            tokio::time::sleep(delay).await;
            waited += delay;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BackoffSettings, RetrySettings};

    async fn next_message(rx: &mut EventReceiver) -> InboundMessage {
        loop {
            match rx.recv().await.expect("event channel closed") {
                SubscriptionEvent::Message(message) => return message,
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn test_publish_fans_out_to_attached_subscriptions() {
        let broker = MemoryBroker::new();
        broker.create_subscription("create", "orders");
        broker.create_subscription("audit", "orders");

        let create = broker.subscribe("create", &SubscriberOptions::default()).await.unwrap();
        let audit = broker.subscribe("audit", &SubscriberOptions::default()).await.unwrap();
        let mut create_rx = create.take_events().unwrap();
        let mut audit_rx = audit.take_events().unwrap();

        let topic = broker.topic("orders", &PublishOptions::default());
        let id = topic.publish(Bytes::from_static(b"{}"), Attributes::new()).await.unwrap();

        assert_eq!(next_message(&mut create_rx).await.id, id);
        assert_eq!(next_message(&mut audit_rx).await.id, id);
        assert_eq!(broker.published("orders").len(), 1);
    }

    #[tokio::test]
    async fn test_take_events_only_once() {
        let broker = MemoryBroker::new();
        let handle = broker.subscribe("create", &SubscriberOptions::default()).await.unwrap();
        assert!(handle.take_events().is_some());
        assert!(handle.take_events().is_none());
    }

    #[tokio::test]
    async fn test_closed_handle_holds_messages_until_open() {
        let broker = MemoryBroker::new();
        let handle = broker.subscribe("update", &SubscriberOptions::default()).await.unwrap();
        let mut rx = handle.take_events().unwrap();

        handle.close().await.unwrap();
        assert!(matches!(rx.recv().await, Some(SubscriptionEvent::Close)));

        broker.deliver("update", "{}", Attributes::new());
        assert_eq!(broker.backlog_len("update"), 1);

        handle.open().await.unwrap();
        let message = next_message(&mut rx).await;
        assert_eq!(message.delivery_attempt, 1);
        assert_eq!(broker.backlog_len("update"), 0);
        assert_eq!(broker.close_calls("update"), 1);
        assert_eq!(broker.open_calls("update"), 1);
    }

    #[tokio::test]
    async fn test_ack_and_nack_tracking() {
        let broker = MemoryBroker::new();
        let handle = broker.subscribe("delete", &SubscriberOptions::default()).await.unwrap();
        let mut rx = handle.take_events().unwrap();

        let first = broker.deliver("delete", "a", Attributes::new());
        next_message(&mut rx).await.ack();
        assert_eq!(broker.acked("delete"), vec![first]);

        let second = broker.deliver("delete", "b", Attributes::new());
        next_message(&mut rx).await.nack();
        let redelivered = next_message(&mut rx).await;
        assert_eq!(redelivered.id, second);
        assert_eq!(redelivered.delivery_attempt, 2);
        assert_eq!(broker.nacked("delete"), vec![second]);
    }

    #[tokio::test]
    async fn test_inject_error_reaches_handle() {
        let broker = MemoryBroker::new();
        let handle = broker.subscribe("create", &SubscriberOptions::default()).await.unwrap();
        let mut rx = handle.take_events().unwrap();

        broker.inject_error("create", BrokerError::new(StatusCode::Unavailable, "down"));
        match rx.recv().await {
            Some(SubscriptionEvent::Error(error)) => assert_eq!(error.code, StatusCode::Unavailable),
            other => panic!("expected error event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_rejects_empty_name() {
        let broker = MemoryBroker::new();
        let error = broker
            .subscribe("", &SubscriberOptions::default())
            .await
            .err()
            .unwrap();
        assert_eq!(error.code, StatusCode::InvalidArgument);
    }

    #[tokio::test]
    async fn test_subscriber_options_are_recorded() {
        let broker = MemoryBroker::new();
        let options = SubscriberOptions {
            ack_deadline: Some(Duration::from_secs(20)),
            ..SubscriberOptions::default()
        };
        broker.subscribe("create", &options).await.unwrap();
        assert_eq!(broker.subscriber_options("create"), Some(options));
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_retries_retryable_failures_with_backoff() {
        let broker = MemoryBroker::new();
        broker.fail_next_publishes("orders", [StatusCode::Unavailable, StatusCode::Aborted]);

        let topic = broker.topic("orders", &PublishOptions::default());
        let started = tokio::time::Instant::now();
        let id = topic.publish(Bytes::from_static(b"x"), Attributes::new()).await.unwrap();

        assert_eq!(id, "1");
        // 100ms then 130ms
        let elapsed = started.elapsed().as_millis();
        assert!((230..240).contains(&elapsed), "elapsed {elapsed}ms");
        assert_eq!(broker.published("orders").len(), 1);
    }

    #[tokio::test]
    async fn test_publish_does_not_retry_non_retryable_failures() {
        let broker = MemoryBroker::new();
        broker.fail_next_publishes("orders", [StatusCode::InvalidArgument]);

        let topic = broker.topic("orders", &PublishOptions::default());
        let error = topic
            .publish(Bytes::from_static(b"x"), Attributes::new())
            .await
            .unwrap_err();

        assert_eq!(error.code, StatusCode::InvalidArgument);
        assert!(broker.published("orders").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_publish_gives_up_after_total_timeout() {
        let broker = MemoryBroker::new();
        broker.fail_next_publishes("orders", std::iter::repeat(StatusCode::Unavailable).take(10));

        let options = PublishOptions {
            retry: RetrySettings {
                backoff: BackoffSettings {
                    initial_retry_delay: Duration::from_millis(100),
                    retry_delay_multiplier: 1.0,
                    total_timeout: Duration::from_millis(350),
                    ..BackoffSettings::default()
                },
                ..RetrySettings::default()
            },
        };
        let topic = broker.topic("orders", &options);
        let error = topic
            .publish(Bytes::from_static(b"x"), Attributes::new())
            .await
            .unwrap_err();

        assert_eq!(error.code, StatusCode::Unavailable);
        assert!(broker.published("orders").is_empty());
    }
}
