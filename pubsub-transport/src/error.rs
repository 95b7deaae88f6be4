use thiserror::Error;

use crate::logging::LoggingError;

/// Errors that can occur in the transport facade
#[derive(Error, Debug)]
pub enum TransportError {
    /// Subscription management failed
    #[error("Subscription error: {0}")]
    Stream(#[from] pubsub_stream::StreamError),

    /// Publishing failed
    #[error("Publish error: {0}")]
    Publish(#[from] pubsub_publisher::PublishError),

    /// The transport configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file could not be read
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for [`TransportConfig`](crate::TransportConfig)
    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// An options factory failed to produce a configuration
    #[error("Options factory failed: {0}")]
    Options(String),

    /// Logging could not be initialized
    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
