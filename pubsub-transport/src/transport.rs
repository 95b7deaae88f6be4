//! The transport facade.

use std::sync::Arc;

use broker_client::BrokerClient;
use pubsub_publisher::PublishAdapter;
use pubsub_stream::{ErrorSink, HandlerLookup, SubscriptionManager};

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::factory::TransportOptionsFactory;

/// Consumer and producer over one broker client.
///
/// [`listen`](Self::listen) attaches to every configured subscription and
/// routes inbound messages to the handlers found through the lookup;
/// [`close`](Self::close) detaches. [`publisher`](Self::publisher) publishes
/// with the configured retry settings.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use broker_client::MemoryBroker;
/// use pubsub_stream::{handler_fn, HandlerRegistry};
/// use pubsub_transport::{PubSubTransport, TransportConfig};
///
/// # #[tokio::main]
/// # async fn main() -> pubsub_transport::Result<()> {
/// let broker = MemoryBroker::new();
/// broker.create_subscription("create", "orders");
///
/// let handlers = Arc::new(HandlerRegistry::new());
/// handlers.register("create", handler_fn(|message| async move {
///     message.ack();
///     Ok(())
/// }));
///
/// let transport = PubSubTransport::from_config(
///     TransportConfig::new(["create"]),
///     Arc::new(broker.clone()),
///     handlers,
/// )?;
/// transport.listen().await?;
/// transport.publisher().publish_message("orders", r#"{"id":1}"#, None, None).await?;
/// transport.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct PubSubTransport {
    config: TransportConfig,
    manager: SubscriptionManager,
    publisher: PublishAdapter,
}

impl PubSubTransport {
    /// Build a transport from a ready config.
    pub fn from_config(
        config: TransportConfig,
        client: Arc<dyn BrokerClient>,
        lookup: Arc<dyn HandlerLookup>,
    ) -> Result<Self> {
        config.validate()?;

        let manager = SubscriptionManager::new(client.clone(), lookup, config.manager_config())?;
        let publisher = PublishAdapter::new(client, config.publish_options.clone());

        Ok(Self {
            config,
            manager,
            publisher,
        })
    }

    /// Build a transport from a config produced by `factory`.
    pub async fn from_factory(
        factory: &dyn TransportOptionsFactory,
        client: Arc<dyn BrokerClient>,
        lookup: Arc<dyn HandlerLookup>,
    ) -> Result<Self> {
        let config = factory
            .create_options()
            .await
            .map_err(|e| TransportError::Options(e.to_string()))?;
        Self::from_config(config, client, lookup)
    }

    /// Replace the sink that receives subscription errors.
    pub fn with_error_sink(mut self, error_sink: Arc<dyn ErrorSink>) -> Self {
        self.manager = self.manager.with_error_sink(error_sink);
        self
    }

    /// Start consuming every configured subscription.
    pub async fn listen(&self) -> Result<()> {
        self.manager.start().await?;
        tracing::info!(
            subscriptions = ?self.config.subscription_ids,
            "transport listening"
        );
        Ok(())
    }

    /// Stop consuming. Safe to call when not listening.
    pub async fn close(&self) -> Result<()> {
        self.manager.stop().await?;
        tracing::info!("transport closed");
        Ok(())
    }

    pub fn publisher(&self) -> &PublishAdapter {
        &self.publisher
    }

    pub fn manager(&self) -> &SubscriptionManager {
        &self.manager
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}
