//! Order events demo
//!
//! Runs the transport against the in-process broker: three subscriptions,
//! handlers for two of them, a transient broker error on one subscription and
//! a clean shutdown.
//!
//! Run with `PUBSUB_LOG_MODE=development cargo run --example order_events`.

use std::sync::Arc;
use std::time::Duration;

use pubsub_transport::broker_client::{BrokerError, MemoryBroker, StatusCode};
use pubsub_transport::{
    handler_fn, logging, HandlerError, HandlerRegistry, PubSubTransport, RecoveryPolicy,
    TransportConfig,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Order {
    id: String,
    total_cents: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging_from_env()?;

    let broker = MemoryBroker::new();
    broker.create_subscription("order-created", "orders.created");
    broker.create_subscription("order-paid", "orders.paid");
    broker.create_subscription("order-cancelled", "orders.cancelled");

    let handlers = Arc::new(HandlerRegistry::new());
    handlers.register(
        "order-created",
        handler_fn(|message| async move {
            let order: Order = serde_json::from_slice(&message.data)?;
            println!("created {} for {} cents", order.id, order.total_cents);
            message.ack();
            Ok::<(), HandlerError>(())
        }),
    );
    handlers.register(
        "order-paid",
        handler_fn(|message| async move {
            println!("paid: {}", message.data_as_str());
            message.ack();
            Ok(())
        }),
    );

    let config = TransportConfig::new(["order-created", "order-paid", "order-cancelled"])
        .with_recovery_policy(RecoveryPolicy::default().with_reopen_delay(Duration::from_millis(500)));
    let transport = PubSubTransport::from_config(config, Arc::new(broker.clone()), handlers)?;
    transport.listen().await?;

    let publisher = transport.publisher();
    publisher
        .publish_json(
            "orders.created",
            &serde_json::json!({ "id": "A-1001", "total_cents": 4599 }),
            None,
        )
        .await?;
    publisher
        .publish_message("orders.paid", r#"{"id":"A-1001"}"#, None, None)
        .await?;
    // No handler: acked and dropped.
    publisher
        .publish_message("orders.cancelled", r#"{"id":"A-0999"}"#, None, None)
        .await?;

    broker.inject_error(
        "order-paid",
        BrokerError::new(StatusCode::Unavailable, "connection reset"),
    );
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!(
        "order-paid after error: closed {} time(s), reopened {} time(s)",
        broker.close_calls("order-paid"),
        broker.open_calls("order-paid")
    );

    tokio::time::sleep(Duration::from_millis(600)).await;
    println!(
        "order-paid after delay: reopened {} time(s)",
        broker.open_calls("order-paid")
    );

    transport.close().await?;
    println!(
        "acked on order-cancelled: {:?}",
        broker.acked("order-cancelled")
    );
    Ok(())
}
