//! # pubsub-stream
//!
//! Consumer side of pubsub-transport: attaches to a fixed set of broker
//! subscriptions, routes every inbound message to the handler registered for
//! its pattern, and keeps subscriptions alive across transient broker errors.
//!
//! - [`SubscriptionManager`] starts and stops all subscriptions
//! - [`MessageDispatcher`] routes one subscription's messages; unroutable
//!   messages are acked and dropped
//! - [`ErrorRecovery`] reports every error to an [`ErrorSink`] and closes and
//!   reopens a subscription after a fixed delay on retryable codes
//! - [`HandlerRegistry`] maps patterns to [`MessageHandler`]s
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use broker_client::MemoryBroker;
//! use pubsub_stream::{handler_fn, HandlerRegistry, SubscriptionManager, SubscriptionManagerConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), pubsub_stream::StreamError> {
//! let broker = MemoryBroker::new();
//! let registry = Arc::new(HandlerRegistry::new());
//! registry.register("create", handler_fn(|message| async move {
//!     println!("created: {}", message.data_as_str());
//!     message.ack();
//!     Ok(())
//! }));
//!
//! let manager = SubscriptionManager::new(
//!     Arc::new(broker.clone()),
//!     registry,
//!     SubscriptionManagerConfig::new(["create"]),
//! )?;
//! manager.start().await?;
//! assert_eq!(manager.subscription_count().await, 1);
//!
//! manager.stop().await?;
//! assert_eq!(broker.close_calls("create"), 1);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod registry;
mod sink;
mod subscription;

pub use config::{PatternSource, RecoveryPolicy, SubscriptionManagerConfig, DEFAULT_REOPEN_DELAY};
pub use error::{HandlerError, Result, StreamError};
pub use registry::{handler_fn, FnHandler, HandlerLookup, HandlerRegistry, MessageHandler};
pub use sink::{ErrorSink, TracingErrorSink};
pub use subscription::{
    ActiveSubscription, DispatchOutcome, DropReason, ErrorRecovery, MessageDispatcher,
    RecoveryAction, ShutdownSignal, SubscriptionManager,
};
