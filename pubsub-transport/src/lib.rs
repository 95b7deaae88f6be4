//! # pubsub-transport
//!
//! Message transport over a managed publish/subscribe broker.
//!
//! ## Overview
//!
//! The transport consumes a fixed set of broker subscriptions and publishes to
//! topics through a single broker client:
//!
//! - **Consuming**: every inbound message is routed to the handler registered
//!   for its pattern. Messages nobody handles are acked and dropped so the
//!   broker does not redeliver them forever.
//! - **Recovery**: transient broker errors close the affected subscription and
//!   reopen it after a fixed 5 second delay. Errors raised while shutting down
//!   never trigger a reopen.
//! - **Publishing**: payloads in any [`Payload`] representation are normalized
//!   to bytes and published with the configured retry settings.
//!
//! ## Crates
//!
//! | Crate | Role |
//! |-------|------|
//! | `broker_client` | Broker traits, options, status codes, in-process broker |
//! | `pubsub_stream` | Subscription manager, dispatch, error recovery |
//! | `pubsub_publisher` | Payload normalization and publishing |
//! | `pubsub_transport` | Config, options factories, logging, this facade |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pubsub_transport::{logging, FileOptions, PubSubTransport};
//!
//! logging::init_logging_from_env()?;
//!
//! let transport = PubSubTransport::from_factory(
//!     &FileOptions::default_location(),
//!     broker_client,
//!     handlers,
//! )
//! .await?;
//!
//! transport.listen().await?;
//! tokio::signal::ctrl_c().await?;
//! transport.close().await?;
//! ```

mod config;
mod error;
mod factory;
pub mod logging;
mod transport;

pub use config::{TransportConfig, CONFIG_PATH_ENV};
pub use error::{Result, TransportError};
pub use factory::{FactoryError, FileOptions, StaticOptions, TransportOptionsFactory};
pub use transport::PubSubTransport;

pub use broker_client;
pub use pubsub_publisher;
pub use pubsub_stream;

pub use broker_client::{Attributes, BrokerClient, BrokerError, InboundMessage, StatusCode};
pub use pubsub_publisher::{Encoding, Payload, PublishAdapter};
pub use pubsub_stream::{
    handler_fn, ErrorSink, HandlerError, HandlerLookup, HandlerRegistry, MessageHandler,
    PatternSource, RecoveryPolicy,
};
