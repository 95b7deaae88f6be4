//! Broker status codes and the error type reported by broker operations.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical broker status codes.
///
/// The numeric values match the status codes used by the managed broker's
/// RPC layer, so codes received off the wire can be converted with
/// [`StatusCode::from_code`].
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    Cancelled,
    Unknown,
    InvalidArgument,
    DeadlineExceeded,
    NotFound,
    AlreadyExists,
    PermissionDenied,
    ResourceExhausted,
    FailedPrecondition,
    Aborted,
    OutOfRange,
    Unimplemented,
    Internal,
    Unavailable,
    DataLoss,
    Unauthenticated,
}

/// Codes the broker classifies as transient.
///
/// Used both as the default publish retry set and as the default set of
/// subscription errors that trigger a close/reopen cycle.
pub const DEFAULT_RETRY_CODES: [StatusCode; 7] = [
    StatusCode::Aborted,
    StatusCode::Cancelled,
    StatusCode::DeadlineExceeded,
    StatusCode::Internal,
    StatusCode::ResourceExhausted,
    StatusCode::Unavailable,
    StatusCode::Unknown,
];

impl StatusCode {
    /// Convert a numeric wire code. Unrecognized values map to `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::Cancelled,
            2 => Self::Unknown,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }

    /// The numeric wire code.
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Cancelled => 1,
            Self::Unknown => 2,
            Self::InvalidArgument => 3,
            Self::DeadlineExceeded => 4,
            Self::NotFound => 5,
            Self::AlreadyExists => 6,
            Self::PermissionDenied => 7,
            Self::ResourceExhausted => 8,
            Self::FailedPrecondition => 9,
            Self::Aborted => 10,
            Self::OutOfRange => 11,
            Self::Unimplemented => 12,
            Self::Internal => 13,
            Self::Unavailable => 14,
            Self::DataLoss => 15,
            Self::Unauthenticated => 16,
        }
    }

    /// The canonical upper-case name, e.g. `DEADLINE_EXCEEDED`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Cancelled => "CANCELLED",
            Self::Unknown => "UNKNOWN",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "FAILED_PRECONDITION",
            Self::Aborted => "ABORTED",
            Self::OutOfRange => "OUT_OF_RANGE",
            Self::Unimplemented => "UNIMPLEMENTED",
            Self::Internal => "INTERNAL",
            Self::Unavailable => "UNAVAILABLE",
            Self::DataLoss => "DATA_LOSS",
            Self::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error reported by the broker, either as the result of an operation or
/// asynchronously on a subscription's event stream.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code} ({}): {message}", .code.code())]
pub struct BrokerError {
    /// Status code that determines recovery policy
    pub code: StatusCode,
    /// Human-readable detail
    pub message: String,
}

impl BrokerError {
    /// Create a new broker error.
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Whether this error's code is a member of `codes`.
    pub fn is_retryable_by(&self, codes: &[StatusCode]) -> bool {
        codes.contains(&self.code)
    }
}

/// Convenience type alias for broker results.
pub type Result<T> = std::result::Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StatusCode::Cancelled, 1, "CANCELLED")]
    #[case(StatusCode::Unknown, 2, "UNKNOWN")]
    #[case(StatusCode::DeadlineExceeded, 4, "DEADLINE_EXCEEDED")]
    #[case(StatusCode::NotFound, 5, "NOT_FOUND")]
    #[case(StatusCode::ResourceExhausted, 8, "RESOURCE_EXHAUSTED")]
    #[case(StatusCode::Aborted, 10, "ABORTED")]
    #[case(StatusCode::Internal, 13, "INTERNAL")]
    #[case(StatusCode::Unavailable, 14, "UNAVAILABLE")]
    fn test_status_code_wire_values(#[case] code: StatusCode, #[case] wire: i32, #[case] name: &str) {
        assert_eq!(code.code(), wire);
        assert_eq!(StatusCode::from_code(wire), code);
        assert_eq!(code.to_string(), name);
    }

    #[test]
    fn test_status_code_round_trips_wire_values() {
        for code in 0..=16 {
            assert_eq!(StatusCode::from_code(code).code(), code);
        }
        assert_eq!(StatusCode::from_code(99), StatusCode::Unknown);
        assert_eq!(StatusCode::from_code(-1), StatusCode::Unknown);
    }

    #[test]
    fn test_default_retry_codes_match_wire_values() {
        let mut codes: Vec<i32> = DEFAULT_RETRY_CODES.iter().map(|c| c.code()).collect();
        codes.sort_unstable();
        assert_eq!(codes, vec![1, 2, 4, 8, 10, 13, 14]);
        assert!(!DEFAULT_RETRY_CODES.contains(&StatusCode::NotFound));
        assert!(!DEFAULT_RETRY_CODES.contains(&StatusCode::InvalidArgument));
    }

    #[test]
    fn test_broker_error_display() {
        let error = BrokerError::new(StatusCode::DeadlineExceeded, "stream timed out");
        assert_eq!(error.to_string(), "DEADLINE_EXCEEDED (4): stream timed out");
    }

    #[test]
    fn test_is_retryable_by() {
        let error = BrokerError::new(StatusCode::Unavailable, "backend down");
        assert!(error.is_retryable_by(&DEFAULT_RETRY_CODES));

        let error = BrokerError::new(StatusCode::NotFound, "no such subscription");
        assert!(!error.is_retryable_by(&DEFAULT_RETRY_CODES));
    }

    #[test]
    fn test_status_code_serde_names() {
        let json = serde_json::to_string(&StatusCode::ResourceExhausted).unwrap();
        assert_eq!(json, "\"RESOURCE_EXHAUSTED\"");
        let code: StatusCode = serde_json::from_str("\"NOT_FOUND\"").unwrap();
        assert_eq!(code, StatusCode::NotFound);
    }
}
