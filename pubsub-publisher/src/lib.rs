//! # pubsub-publisher
//!
//! Publish side of pubsub-transport. [`PublishAdapter`] accepts a message body
//! in any [`Payload`] representation, normalizes it to bytes and publishes it
//! through the broker client, returning the broker-assigned message id.
//!
//! ```
//! use std::sync::Arc;
//! use broker_client::{MemoryBroker, PublishOptions};
//! use pubsub_publisher::{Encoding, PublishAdapter};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), pubsub_publisher::PublishError> {
//! let broker = MemoryBroker::new();
//! let publisher = PublishAdapter::new(Arc::new(broker.clone()), PublishOptions::default());
//!
//! publisher.publish_message("orders", r#"{"id":"12345"}"#, None, None).await?;
//! publisher.publish_message("orders", "aGk=", None, Some(Encoding::Base64)).await?;
//!
//! let published = broker.published("orders");
//! assert_eq!(&published[1].data[..], b"hi");
//! # Ok(())
//! # }
//! ```

mod adapter;
mod encoding;
mod error;
mod payload;

pub use adapter::PublishAdapter;
pub use encoding::Encoding;
pub use error::{PublishError, Result};
pub use payload::Payload;
