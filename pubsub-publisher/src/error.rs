use broker_client::BrokerError;
use thiserror::Error;

/// Errors returned by the publish adapter.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The broker client rejected the publish; retries were already
    /// exhausted by the client
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// The value passed to `publish_json` could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An encoding name was not recognized
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),
}

/// Result type alias for publishing.
pub type Result<T> = std::result::Result<T, PublishError>;
