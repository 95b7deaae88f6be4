//! Destination for subscription errors.

use broker_client::BrokerError;

/// Receives every error raised by a managed subscription, whether or not it
/// triggers recovery.
pub trait ErrorSink: Send + Sync {
    fn report(&self, subscription_id: &str, error: &BrokerError);
}

/// Default sink: logs each error at `error` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, subscription_id: &str, error: &BrokerError) {
        tracing::error!(
            subscription = %subscription_id,
            code = %error.code,
            "subscription error: {}",
            error.message
        );
    }
}
