//! Deferred configuration.
//!
//! Applications that resolve their settings at startup (secrets managers,
//! remote config, files) implement [`TransportOptionsFactory`] and build the
//! transport with [`PubSubTransport::from_factory`](crate::PubSubTransport::from_factory).

use std::path::PathBuf;

use async_trait::async_trait;

use crate::config::TransportConfig;

/// Error type returned by options factories.
pub type FactoryError = Box<dyn std::error::Error + Send + Sync>;

/// Produces a [`TransportConfig`] asynchronously.
#[async_trait]
pub trait TransportOptionsFactory: Send + Sync {
    async fn create_options(&self) -> Result<TransportConfig, FactoryError>;
}

/// Factory returning a fixed config.
#[derive(Debug, Clone)]
pub struct StaticOptions(pub TransportConfig);

#[async_trait]
impl TransportOptionsFactory for StaticOptions {
    async fn create_options(&self) -> Result<TransportConfig, FactoryError> {
        Ok(self.0.clone())
    }
}

/// Factory reading a JSON config file.
///
/// Without an explicit path it reads the file
/// [`TransportConfig::load_default`] would.
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    path: Option<PathBuf>,
}

impl FileOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Read from the default location.
    pub fn default_location() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransportOptionsFactory for FileOptions {
    async fn create_options(&self) -> Result<TransportConfig, FactoryError> {
        let path = match &self.path {
            Some(path) => path.clone(),
            None => TransportConfig::default_path()
                .ok_or("no config path: PUBSUB_TRANSPORT_CONFIG is unset and there is no config directory")?,
        };

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| format!("{}: {e}", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_static_options() {
        let factory = StaticOptions(TransportConfig::new(["create"]));
        let config = factory.create_options().await.unwrap();
        assert_eq!(config.subscription_ids, vec!["create"]);
    }

    #[tokio::test]
    async fn test_file_options() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "subscription_ids": ["create", "update"] }}"#).unwrap();

        let config = FileOptions::new(file.path()).create_options().await.unwrap();
        assert_eq!(config.subscription_ids, vec!["create", "update"]);
    }

    #[tokio::test]
    async fn test_file_options_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");

        let error = FileOptions::new(&path).create_options().await.unwrap_err();
        assert!(error.to_string().contains("absent.json"));
    }

    #[tokio::test]
    async fn test_file_options_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(FileOptions::new(file.path()).create_options().await.is_err());
    }
}
