//! Delivery outcome model: how a provider send call ended.

use serde::{Deserialize, Serialize};

/// Classification of a failed send.
///
/// - `QuotaExceeded` / `AuthError`: run-fatal, abort the active loop.
/// - `Transient`: retried locally with backoff.
/// - `Permanent`: isolated to the recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    QuotaExceeded,
    AuthError,
    Transient,
    Permanent,
}

impl FailureKind {
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, FailureKind::QuotaExceeded | FailureKind::AuthError)
    }
}

/// A failed send as reported by the delivery client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("{kind:?}: {reason}")]
pub struct DeliveryFailure {
    pub kind: FailureKind,
    pub reason: String,
}

impl DeliveryFailure {
    pub fn new(kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    pub fn quota_exceeded(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::QuotaExceeded, reason)
    }

    pub fn auth(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::AuthError, reason)
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Transient, reason)
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::new(FailureKind::Permanent, reason)
    }
}

/// Provider acknowledgement of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
}

impl DeliveryReceipt {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_quota_and_auth_are_run_fatal() {
        assert!(FailureKind::QuotaExceeded.is_run_fatal());
        assert!(FailureKind::AuthError.is_run_fatal());
        assert!(!FailureKind::Transient.is_run_fatal());
        assert!(!FailureKind::Permanent.is_run_fatal());
    }

    #[test]
    fn failure_kind_serializes_as_snake_case() {
        let s = serde_json::to_string(&FailureKind::QuotaExceeded).unwrap();
        assert_eq!(s, "\"quota_exceeded\"");
    }
}
