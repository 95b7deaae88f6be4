//! Configuration types for the pubsub-stream crate
//!
//! This module defines the structures that control which subscriptions the
//! [`SubscriptionManager`](crate::SubscriptionManager) attaches to, how inbound
//! messages are routed to handlers, and how broker errors are recovered from.

use std::borrow::Cow;
use std::collections::HashSet;
use std::time::Duration;

use broker_client::{StatusCode, SubscriberOptions, DEFAULT_RETRY_CODES};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Fixed delay between closing a subscription on a retryable error and
/// reopening it.
pub const DEFAULT_REOPEN_DELAY: Duration = Duration::from_millis(5000);

/// Where the routing pattern of an inbound message comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "snake_case")]
pub enum PatternSource {
    /// Route by the id of the subscription the message arrived on
    #[default]
    SubscriptionId,
    /// Route by a string field of the JSON message body
    MessageField(String),
}

impl PatternSource {
    /// Resolve the routing pattern for a message.
    ///
    /// Returns `None` when the pattern cannot be determined: the body is not a
    /// JSON object or the configured field is missing or not a string.
    pub fn resolve<'a>(&self, subscription_id: &'a str, data: &[u8]) -> Option<Cow<'a, str>> {
        match self {
            PatternSource::SubscriptionId => Some(Cow::Borrowed(subscription_id)),
            PatternSource::MessageField(key) => {
                let body: serde_json::Value = serde_json::from_slice(data).ok()?;
                body.get(key)?.as_str().map(|pattern| Cow::Owned(pattern.to_string()))
            }
        }
    }
}

/// Which broker errors trigger a close/reopen cycle, and how long to wait
/// before reopening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    /// Codes classified as transient
    /// Default: ABORTED, CANCELLED, DEADLINE_EXCEEDED, INTERNAL,
    /// RESOURCE_EXHAUSTED, UNAVAILABLE, UNKNOWN
    pub retryable_codes: Vec<StatusCode>,

    /// Flat delay before reopening, no backoff
    /// Default: 5000 ms
    #[serde(rename = "reopen_delay_ms", with = "broker_client::serde_millis")]
    pub reopen_delay: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            retryable_codes: DEFAULT_RETRY_CODES.to_vec(),
            reopen_delay: DEFAULT_REOPEN_DELAY,
        }
    }
}

impl RecoveryPolicy {
    /// Also treat NOT_FOUND as transient.
    ///
    /// Useful when subscriptions are provisioned asynchronously by another
    /// process and may not exist yet when the manager starts.
    pub fn with_not_found_retry(mut self) -> Self {
        if !self.retryable_codes.contains(&StatusCode::NotFound) {
            self.retryable_codes.push(StatusCode::NotFound);
        }
        self
    }

    /// Set the reopen delay.
    pub fn with_reopen_delay(mut self, delay: Duration) -> Self {
        self.reopen_delay = delay;
        self
    }

    pub fn is_retryable(&self, code: StatusCode) -> bool {
        self.retryable_codes.contains(&code)
    }
}

/// Configuration for the [`SubscriptionManager`](crate::SubscriptionManager).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionManagerConfig {
    /// Subscriptions to attach to, in start order
    pub subscription_ids: Vec<String>,

    /// Tuning passed through to the broker for every subscription
    pub subscriber_options: SubscriberOptions,

    /// How inbound messages are mapped to a handler pattern
    /// Default: the subscription id
    pub pattern_source: PatternSource,

    /// Error recovery behavior
    pub recovery_policy: RecoveryPolicy,
}

impl SubscriptionManagerConfig {
    /// Create a config for the given subscriptions with default settings.
    pub fn new<I, S>(subscription_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subscription_ids: subscription_ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_subscriber_options(mut self, options: SubscriberOptions) -> Self {
        self.subscriber_options = options;
        self
    }

    pub fn with_pattern_source(mut self, source: PatternSource) -> Self {
        self.pattern_source = source;
        self
    }

    pub fn with_recovery_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.recovery_policy = policy;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.subscription_ids.is_empty() {
            return Err(StreamError::Configuration(
                "subscription_ids must not be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for id in &self.subscription_ids {
            if id.trim().is_empty() {
                return Err(StreamError::Configuration(
                    "subscription ids must not be blank".to_string(),
                ));
            }
            if !seen.insert(id.as_str()) {
                return Err(StreamError::Configuration(format!(
                    "duplicate subscription id: {id}"
                )));
            }
        }

        if let PatternSource::MessageField(key) = &self.pattern_source {
            if key.is_empty() {
                return Err(StreamError::Configuration(
                    "pattern field name must not be empty".to_string(),
                ));
            }
        }

        if self.recovery_policy.reopen_delay.is_zero() {
            return Err(StreamError::Configuration(
                "reopen_delay must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
