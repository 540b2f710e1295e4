//! DeliveryClient port - the provider boundary.
//!
//! Converts a rendered message into one provider call and classifies the
//! outcome. Retries, timeouts and pacing live in the engine, not here.

use std::fmt;

use async_trait::async_trait;

use crate::domain::{DeliveryFailure, DeliveryReceipt, OutgoingMessage};
use crate::error::AuthError;

/// An authenticated provider session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub sender: String,
    token: String,
}

impl Session {
    pub fn new(sender: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sender", &self.sender)
            .field("token", &"[redacted]")
            .finish()
    }
}

#[async_trait]
pub trait DeliveryClient: Send + Sync {
    /// Produce a valid session or fail.
    async fn authenticate(&self) -> Result<Session, AuthError>;

    /// Send one message. Exactly one provider call per invocation.
    async fn send(
        &self,
        session: &Session,
        message: &OutgoingMessage,
    ) -> Result<DeliveryReceipt, DeliveryFailure>;
}
