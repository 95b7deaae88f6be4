//! Broker collaborator interfaces for pubsub-transport.
//!
//! This crate defines the narrow surface the rest of the workspace uses to talk
//! to a managed publish/subscribe broker:
//!
//! - [`BrokerClient`]: attaches to subscriptions and hands out topic handles
//! - [`SubscriptionHandle`]: a live subscription that emits [`SubscriptionEvent`]s
//!   on a channel and can be closed and reopened
//! - [`TopicHandle`]: publishes bytes plus attributes and returns the message id
//!
//! It also carries the option records passed through to the broker
//! ([`SubscriberOptions`], [`PublishOptions`], [`AuthOptions`]), the canonical
//! [`StatusCode`] set, and [`MemoryBroker`], an in-process implementation used by
//! tests and demos.
//!
//! # Example
//!
//! ```
//! use broker_client::{BrokerClient, MemoryBroker, PublishOptions, SubscriberOptions, SubscriptionEvent};
//! use bytes::Bytes;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), broker_client::BrokerError> {
//! let broker = MemoryBroker::new();
//! broker.create_subscription("create", "orders");
//!
//! let handle = broker.subscribe("create", &SubscriberOptions::default()).await?;
//! let mut events = handle.take_events().expect("fresh handle");
//!
//! let id = broker
//!     .topic("orders", &PublishOptions::default())
//!     .publish(Bytes::from_static(b"{\"id\":1}"), Default::default())
//!     .await?;
//!
//! if let Some(SubscriptionEvent::Message(message)) = events.recv().await {
//!     assert_eq!(message.id, id);
//!     message.ack();
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod memory;
mod message;
mod options;
pub mod serde_millis;

pub use client::{BrokerClient, SubscriptionHandle, TopicHandle};
pub use error::{BrokerError, Result, StatusCode, DEFAULT_RETRY_CODES};
pub use memory::{MemoryBroker, MemoryHandle, PublishedMessage};
pub use message::{
    Acknowledger, Attributes, EventReceiver, EventSender, InboundMessage, SubscriptionEvent,
};
pub use options::{
    AuthOptions, BackoffDelays, BackoffSettings, BatchingOptions, CredentialBody,
    FlowControlOptions, PublishOptions, RetrySettings, Scopes, StreamingOptions,
    SubscriberOptions,
};
