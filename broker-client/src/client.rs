//! Broker collaborator interfaces.
//!
//! The subscription manager and the publish adapter only ever talk to the
//! broker through these traits. A production client wraps the managed
//! broker's SDK; [`MemoryBroker`](crate::memory::MemoryBroker) is the
//! in-process implementation.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::message::{Attributes, EventReceiver};
use crate::options::{PublishOptions, SubscriberOptions};

/// Entry point into the broker.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Attach to the named subscription.
    ///
    /// The returned handle is open and starts emitting events on the channel
    /// obtained from [`SubscriptionHandle::take_events`].
    async fn subscribe(
        &self,
        name: &str,
        options: &SubscriberOptions,
    ) -> Result<Arc<dyn SubscriptionHandle>>;

    /// Handle for publishing to the named topic with the given options.
    fn topic(&self, name: &str, options: &PublishOptions) -> Arc<dyn TopicHandle>;
}

/// A live connection to one subscription.
#[async_trait]
pub trait SubscriptionHandle: Send + Sync {
    /// Subscription name.
    fn name(&self) -> &str;

    /// Take the event receiver. Returns `None` after the first call.
    fn take_events(&self) -> Option<EventReceiver>;

    /// Stop receiving messages. Emits `SubscriptionEvent::Close`.
    async fn close(&self) -> Result<()>;

    /// Resume receiving messages after a close.
    async fn open(&self) -> Result<()>;

    /// Whether the handle is currently receiving.
    fn is_open(&self) -> bool;
}

/// A publish target.
#[async_trait]
pub trait TopicHandle: Send + Sync {
    /// Topic name.
    fn name(&self) -> &str;

    /// Publish a message and return the broker-assigned id.
    ///
    /// Retries are executed here, according to the handle's
    /// [`PublishOptions`].
    async fn publish(&self, data: Bytes, attributes: Attributes) -> Result<String>;
}
