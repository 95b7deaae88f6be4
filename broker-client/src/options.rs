//! Option records passed to the broker client.
//!
//! All records are serde-deserializable so they can be embedded in a
//! transport config file. Durations are expressed in milliseconds on the wire.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StatusCode, DEFAULT_RETRY_CODES};

/// Service-account credentials embedded directly in the config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialBody {
    pub client_email: Option<String>,
    pub private_key: Option<String>,
}

/// One scope or a list of scopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scopes {
    One(String),
    Many(Vec<String>),
}

impl Scopes {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Scopes::One(scope) => vec![scope.clone()],
            Scopes::Many(scopes) => scopes.clone(),
        }
    }
}

/// Authentication options handed to the broker client at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthOptions {
    /// Path to a .json, .pem, or .p12 key file
    pub key_filename: Option<String>,
    /// Path to a .json, .pem, or .p12 key file
    pub key_file: Option<String>,
    /// Inline credentials
    pub credentials: Option<CredentialBody>,
    /// Required scopes for the desired API request
    pub scopes: Option<Scopes>,
    /// Project that owns the topics and subscriptions
    pub project_id: Option<String>,
    /// Override of the broker endpoint
    pub api_endpoint: Option<String>,
}

impl AuthOptions {
    /// Options naming only a project; credentials come from the environment.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::default()
        }
    }

    /// Whether some credential source is configured.
    pub fn has_credentials(&self) -> bool {
        self.key_filename.is_some()
            || self.key_file.is_some()
            || self
                .credentials
                .as_ref()
                .is_some_and(|c| c.client_email.is_some() && c.private_key.is_some())
    }

    /// Reject options that can identify neither a project nor a credential.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(project_id) = &self.project_id {
            if project_id.trim().is_empty() {
                return Err("project_id must not be empty".to_string());
            }
            return Ok(());
        }
        if self.has_credentials() {
            return Ok(());
        }
        Err("auth options need a project_id or a credential source".to_string())
    }
}

/// Flow control applied to a subscriber stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowControlOptions {
    pub max_messages: Option<usize>,
    pub max_bytes: Option<usize>,
    pub allow_excess_messages: Option<bool>,
}

/// Ack batching applied to a subscriber stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingOptions {
    pub max_messages: Option<usize>,
    pub max_milliseconds: Option<u64>,
}

/// Streaming-pull tuning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingOptions {
    pub high_water_mark: Option<usize>,
    pub max_streams: Option<usize>,
    #[serde(rename = "timeout_ms", with = "crate::serde_millis::option")]
    pub timeout: Option<Duration>,
}

/// Subscription tuning, applied uniformly to every managed subscription and
/// passed through to the broker client unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberOptions {
    #[serde(rename = "ack_deadline_ms", with = "crate::serde_millis::option")]
    pub ack_deadline: Option<Duration>,
    pub flow_control: Option<FlowControlOptions>,
    pub batching: Option<BatchingOptions>,
    pub streaming: Option<StreamingOptions>,
}

/// Exponential backoff executed by the broker client for retryable publish
/// failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    #[serde(rename = "initial_retry_delay_ms", with = "crate::serde_millis")]
    pub initial_retry_delay: Duration,
    pub retry_delay_multiplier: f64,
    #[serde(rename = "max_retry_delay_ms", with = "crate::serde_millis")]
    pub max_retry_delay: Duration,
    #[serde(rename = "initial_rpc_timeout_ms", with = "crate::serde_millis")]
    pub initial_rpc_timeout: Duration,
    pub rpc_timeout_multiplier: f64,
    #[serde(rename = "max_rpc_timeout_ms", with = "crate::serde_millis")]
    pub max_rpc_timeout: Duration,
    #[serde(rename = "total_timeout_ms", with = "crate::serde_millis")]
    pub total_timeout: Duration,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            initial_retry_delay: Duration::from_millis(100),
            retry_delay_multiplier: 1.3,
            max_retry_delay: Duration::from_millis(60_000),
            initial_rpc_timeout: Duration::from_millis(12_000),
            rpc_timeout_multiplier: 1.0,
            max_rpc_timeout: Duration::from_millis(30_000),
            total_timeout: Duration::from_millis(600_000),
        }
    }
}

impl BackoffSettings {
    /// The retry delay schedule: `min(initial * multiplier^n, max)`.
    ///
    /// The iterator is unbounded; callers stop it against `total_timeout`.
    pub fn delays(&self) -> BackoffDelays {
        BackoffDelays {
            next: self.initial_retry_delay,
            multiplier: self.retry_delay_multiplier,
            max: self.max_retry_delay,
        }
    }

    /// Per-call timeout for the zero-based `attempt`.
    pub fn rpc_timeout(&self, attempt: u32) -> Duration {
        let factor = self.rpc_timeout_multiplier.powi(attempt as i32);
        self.initial_rpc_timeout
            .mul_f64(factor)
            .min(self.max_rpc_timeout)
    }
}

/// Iterator over backoff delays, see [`BackoffSettings::delays`].
#[derive(Debug, Clone)]
pub struct BackoffDelays {
    next: Duration,
    multiplier: f64,
    max: Duration,
}

impl Iterator for BackoffDelays {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next.min(self.max);
        self.next = current.mul_f64(self.multiplier).min(self.max);
        Some(current)
    }
}

/// Retry policy for publish calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub retry_codes: Vec<StatusCode>,
    pub backoff: BackoffSettings,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retry_codes: DEFAULT_RETRY_CODES.to_vec(),
            backoff: BackoffSettings::default(),
        }
    }
}

impl RetrySettings {
    pub fn is_retryable(&self, code: StatusCode) -> bool {
        self.retry_codes.contains(&code)
    }
}

/// Options attached to a topic handle for every publish through it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishOptions {
    pub retry: RetrySettings,
}
