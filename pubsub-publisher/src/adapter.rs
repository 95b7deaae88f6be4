//! Publish side of the transport.

use std::sync::Arc;

use broker_client::{Attributes, BrokerClient, PublishOptions};
use serde::Serialize;

use crate::encoding::Encoding;
use crate::error::Result;
use crate::payload::Payload;

/// Publishes messages to broker topics.
///
/// Every publish goes through a topic handle configured with the adapter's
/// [`PublishOptions`]; the broker client executes their retry policy. The
/// adapter does not retry on its own.
pub struct PublishAdapter {
    client: Arc<dyn BrokerClient>,
    options: PublishOptions,
}

impl PublishAdapter {
    pub fn new(client: Arc<dyn BrokerClient>, options: PublishOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &PublishOptions {
        &self.options
    }

    /// Publish a message and return the broker-assigned message id.
    ///
    /// `payload` is normalized to bytes first; see [`Payload::into_bytes`].
    /// Missing attributes are sent as an empty map. Broker failures are
    /// returned unchanged as [`PublishError::Broker`](crate::PublishError::Broker).
    pub async fn publish_message(
        &self,
        topic: &str,
        payload: impl Into<Payload>,
        attributes: Option<Attributes>,
        encoding: Option<Encoding>,
    ) -> Result<String> {
        let payload = payload.into();
        let kind = payload.kind();
        let data = payload.into_bytes(encoding);

        let id = self
            .client
            .topic(topic, &self.options)
            .publish(data, attributes.unwrap_or_default())
            .await
            .inspect_err(|e| {
                tracing::warn!(topic = %topic, code = %e.code, "publish failed: {}", e.message);
            })?;

        tracing::debug!(topic = %topic, kind, message_id = %id, "message published");
        Ok(id)
    }

    /// Serialize `value` as JSON and publish it as UTF-8 text.
    pub async fn publish_json<T>(
        &self,
        topic: &str,
        value: &T,
        attributes: Option<Attributes>,
    ) -> Result<String>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(value)?;
        self.publish_message(topic, text, attributes, None).await
    }
}
