//! Shutting-down flag shared by one manager generation and its recovery timers.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;

/// Shared shutting-down flag.
///
/// Reads are a plain atomic load. Setting the flag waits for any reopen that
/// is running under [`ShutdownSignal::run_unless_set`], so once
/// [`ShutdownSignal::trigger`] returns no reopen can start or still be in
/// progress.
///
/// The flag only goes from unset to set. A restarted manager takes a new
/// signal instead of clearing the old one.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    shutting_down: AtomicBool,
    gate: RwLock<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    /// Set the flag.
    pub async fn trigger(&self) {
        let _gate = self.inner.gate.write().await;
        self.inner.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Run `action` unless the flag is set, holding off `trigger` until it
    /// completes.
    pub async fn run_unless_set<F>(&self, action: F) -> Option<F::Output>
    where
        F: Future,
    {
        let _gate = self.inner.gate.read().await;
        if self.is_set() {
            return None;
        }
        Some(action.await)
    }
}
