//! Error types for the pubsub-stream crate.

use broker_client::BrokerError;

/// Errors raised while managing subscriptions.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The broker client rejected a subscribe call
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The broker returned a handle whose event stream was already taken
    #[error("Event stream for subscription {0} is unavailable")]
    EventStreamUnavailable(String),
}

/// Errors returned by message handlers.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler could not process the message
    #[error("Handler failed: {0}")]
    Failed(String),

    /// The message body did not decode into the expected shape
    #[error("Failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Result type alias for subscription management.
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;
    use broker_client::StatusCode;

    #[test]
    fn test_error_display() {
        let error = StreamError::Configuration("subscription_ids must not be empty".to_string());
        assert_eq!(
            error.to_string(),
            "Configuration error: subscription_ids must not be empty"
        );

        let error = StreamError::EventStreamUnavailable("create".to_string());
        assert_eq!(
            error.to_string(),
            "Event stream for subscription create is unavailable"
        );
    }

    #[test]
    fn test_broker_error_conversion() {
        let broker_error = BrokerError::new(StatusCode::PermissionDenied, "no access");
        let error: StreamError = broker_error.into();
        assert!(matches!(
            error,
            StreamError::Broker(BrokerError {
                code: StatusCode::PermissionDenied,
                ..
            })
        ));
        assert!(error.to_string().starts_with("Broker error: PERMISSION_DENIED"));
    }

    #[test]
    fn test_handler_error_from_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let error: HandlerError = json_error.into();
        assert!(matches!(error, HandlerError::Decode(_)));
        assert!(error.to_string().starts_with("Failed to decode message:"));

        assert_eq!(
            HandlerError::failed("database down").to_string(),
            "Handler failed: database down"
        );
    }
}
