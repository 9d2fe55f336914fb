//! Error types for medsync-client.

use medsync_core::QueueError;
use medsync_types::EndpointKind;
use thiserror::Error;

/// Key-value store and persistence errors. Fatal for the operation that hit them.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing store rejected the operation.
    #[error("store {operation} failed for key {key}: {message}")]
    Backend {
        /// `get`, `set` or `remove`.
        operation: &'static str,
        /// Key involved.
        key: String,
        /// Backend-specific detail.
        message: String,
    },

    /// A value could not be encoded for storage.
    #[error("failed to encode value for key {key}: {source}")]
    Encode {
        /// Key involved.
        key: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A stored value could not be decoded.
    #[error("failed to decode value for key {key}: {source}")]
    Decode {
        /// Key involved.
        key: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The in-memory queue refused the operation.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Failures talking to a translation, health, discovery or session endpoint.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// No response within the timeout.
    #[error("request timed out")]
    Timeout,

    /// Could not reach the endpoint.
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Whether the failure is a connectivity problem rather than a rejection.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network(_))
    }
}

/// One failed endpoint attempt within a dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    /// Descriptor id of the endpoint.
    pub endpoint_id: String,
    /// Edge or cloud.
    pub kind: EndpointKind,
    /// Error message.
    pub error: String,
}

/// Errors from [`RequestDispatcher`](crate::RequestDispatcher).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Every endpoint in the attempt plan failed.
    #[error("translation unavailable: {}", describe_attempts(.attempts))]
    TranslationUnavailable {
        /// Each failed attempt, in order.
        attempts: Vec<FailedAttempt>,
    },

    /// Offline, no cached result, and the request could not be queued.
    #[error("offline with no cached result and the request could not be queued: {0}")]
    OfflineNoCache(#[source] StorageError),
}

fn describe_attempts(attempts: &[FailedAttempt]) -> String {
    if attempts.is_empty() {
        return "no endpoints attempted".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{} ({}): {}", a.endpoint_id, a.kind, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from session join/end.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session endpoint failed.
    #[error("session request failed: {0}")]
    Api(#[from] ApiError),

    /// Persisting or clearing session keys failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The session channel could not be set up.
    #[error(transparent)]
    Channel(#[from] crate::channel::ChannelError),

    /// No session is active.
    #[error("no active session")]
    NoSession,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_lists_each_attempt() {
        let err = DispatchError::TranslationUnavailable {
            attempts: vec![
                FailedAttempt {
                    endpoint_id: "edge:http://10.0.0.2:3000".into(),
                    kind: EndpointKind::Edge,
                    error: "request timed out".into(),
                },
                FailedAttempt {
                    endpoint_id: "cloud".into(),
                    kind: EndpointKind::Cloud,
                    error: "HTTP 503: overloaded".into(),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("edge:http://10.0.0.2:3000 (edge): request timed out"));
        assert!(msg.contains("cloud (cloud): HTTP 503"));
    }

    #[test]
    fn connectivity_classification() {
        assert!(ApiError::Timeout.is_connectivity());
        assert!(ApiError::Network("refused".into()).is_connectivity());
        assert!(!ApiError::Status {
            status: 400,
            message: "bad".into()
        }
        .is_connectivity());
    }
}
