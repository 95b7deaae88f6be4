//! Routing of inbound messages to handlers.

use std::sync::Arc;

use broker_client::InboundMessage;

use crate::config::PatternSource;
use crate::registry::HandlerLookup;

/// What happened to a dispatched message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A handler ran and returned success
    Handled,
    /// A handler ran and returned an error; settlement was left to it
    HandlerFailed,
    /// No handler matched; the message was acked and discarded
    Dropped(DropReason),
}

/// Why a message was discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// No routing pattern could be derived from the message
    NoPattern,
    /// Nothing is registered under the resolved pattern
    NoHandler(String),
}

/// Dispatch callback bound to one subscription.
pub struct MessageDispatcher {
    subscription_id: String,
    pattern_source: PatternSource,
    lookup: Arc<dyn HandlerLookup>,
}

impl MessageDispatcher {
    pub fn new(
        subscription_id: impl Into<String>,
        pattern_source: PatternSource,
        lookup: Arc<dyn HandlerLookup>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            pattern_source,
            lookup,
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// Route a message to its handler.
    ///
    /// Unroutable messages are acked so the broker does not redeliver them.
    /// Routed messages are never settled here.
    pub async fn dispatch(&self, message: InboundMessage) -> DispatchOutcome {
        let Some(pattern) = self
            .pattern_source
            .resolve(&self.subscription_id, &message.data)
        else {
            tracing::warn!(
                subscription = %self.subscription_id,
                message_id = %message.id,
                "no routing pattern in message, acking and dropping"
            );
            message.ack();
            return DispatchOutcome::Dropped(DropReason::NoPattern);
        };

        let Some(handler) = self.lookup.lookup(&pattern) else {
            tracing::warn!(
                subscription = %self.subscription_id,
                pattern = %pattern,
                message_id = %message.id,
                "no handler registered, acking and dropping message"
            );
            message.ack();
            return DispatchOutcome::Dropped(DropReason::NoHandler(pattern.into_owned()));
        };

        let message_id = message.id.clone();
        tracing::debug!(
            subscription = %self.subscription_id,
            pattern = %pattern,
            message_id = %message_id,
            attempt = message.delivery_attempt,
            "dispatching message"
        );

        match handler.handle(message).await {
            Ok(()) => DispatchOutcome::Handled,
            Err(e) => {
                tracing::error!(
                    subscription = %self.subscription_id,
                    pattern = %pattern,
                    message_id = %message_id,
                    "message handler failed: {}",
                    e
                );
                DispatchOutcome::HandlerFailed
            }
        }
    }
}
