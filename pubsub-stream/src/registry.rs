//! Message handlers and the pattern registry used to look them up.
//!
//! The [`MessageDispatcher`](crate::MessageDispatcher) resolves a routing
//! pattern for each inbound message and asks a [`HandlerLookup`] for the
//! handler registered under it. [`HandlerRegistry`] is the concrete lookup the
//! transport uses.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use broker_client::InboundMessage;
use dashmap::DashMap;

use crate::error::HandlerError;

/// Processes messages routed to one pattern.
///
/// The handler owns settlement: it is expected to call
/// [`InboundMessage::ack`] or [`InboundMessage::nack`] itself.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage) -> Result<(), HandlerError>;
}

/// Maps a routing pattern to its handler.
pub trait HandlerLookup: Send + Sync {
    fn lookup(&self, pattern: &str) -> Option<Arc<dyn MessageHandler>>;
}

/// Handler backed by an async closure, see [`handler_fn`].
pub struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> MessageHandler for FnHandler<F>
where
    F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: InboundMessage) -> Result<(), HandlerError> {
        (self.f)(message).await
    }
}

/// Wrap an async closure as a [`MessageHandler`].
///
/// ```
/// use pubsub_stream::{handler_fn, HandlerRegistry};
///
/// let registry = HandlerRegistry::new();
/// registry.register("create", handler_fn(|message| async move {
///     message.ack();
///     Ok(())
/// }));
/// assert!(registry.contains("create"));
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn MessageHandler>
where
    F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Concurrent pattern to handler map.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, returning the one it replaces.
    pub fn register(
        &self,
        pattern: impl Into<String>,
        handler: Arc<dyn MessageHandler>,
    ) -> Option<Arc<dyn MessageHandler>> {
        let pattern = pattern.into();
        let previous = self.handlers.insert(pattern.clone(), handler);
        if previous.is_some() {
            tracing::debug!(pattern = %pattern, "replaced message handler");
        }
        previous
    }

    pub fn unregister(&self, pattern: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.remove(pattern).map(|(_, handler)| handler)
    }

    pub fn contains(&self, pattern: &str) -> bool {
        self.handlers.contains_key(pattern)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered patterns, sorted.
    pub fn patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        patterns.sort();
        patterns
    }
}

impl HandlerLookup for HandlerRegistry {
    fn lookup(&self, pattern: &str) -> Option<Arc<dyn MessageHandler>> {
        self.handlers.get(pattern).map(|entry| entry.value().clone())
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("patterns", &self.patterns())
            .finish()
    }
}
