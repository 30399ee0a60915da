//! Synchronization error types.
//!
//! None of these errors is fatal to the timer: a failed delivery is retried
//! and a malformed snapshot leaves the local state untouched.

use thiserror::Error;

/// Errors raised while handing a snapshot to the transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The receiving side of the transport is gone.
    #[error("transport disconnected")]
    Disconnected,

    /// The transport cannot accept another snapshot right now.
    #[error("transport busy")]
    Busy,

    /// Delivery failed for another reason.
    #[error("delivery failed: {0}")]
    Delivery(String),
}

impl TransportError {
    /// Returns true if a later attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }
}

/// Errors found while parsing an incoming snapshot.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    /// The payload is not a JSON object.
    #[error("snapshot payload is not an object")]
    NotAnObject,

    /// A required timer field is absent.
    #[error("snapshot field '{0}' is missing")]
    MissingField(&'static str),

    /// A field is present but has the wrong type or an unknown value.
    #[error("snapshot field '{field}' is invalid (expected {expected})")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        assert_eq!(TransportError::Disconnected.to_string(), "transport disconnected");
        assert_eq!(
            TransportError::Delivery("refused".into()).to_string(),
            "delivery failed: refused"
        );
    }

    #[test]
    fn test_transport_error_retryable() {
        assert!(!TransportError::Disconnected.is_retryable());
        assert!(TransportError::Busy.is_retryable());
        assert!(TransportError::Delivery(String::new()).is_retryable());
    }

    #[test]
    fn test_snapshot_error_display() {
        assert_eq!(
            SnapshotError::MissingField("is_running").to_string(),
            "snapshot field 'is_running' is missing"
        );
        assert_eq!(
            SnapshotError::InvalidField {
                field: "current_session",
                expected: "session tag"
            }
            .to_string(),
            "snapshot field 'current_session' is invalid (expected session tag)"
        );
    }
}
