//! ScriptedDeliveryClient - a delivery client that replays scripted outcomes.
//!
//! Each `send` consumes the next scripted result; once the script runs out,
//! every call succeeds. Every message is recorded for inspection.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::{DeliveryFailure, DeliveryReceipt, OutgoingMessage};
use crate::error::AuthError;
use crate::ports::{DeliveryClient, Session};

#[derive(Debug, Default)]
pub struct ScriptedDeliveryClient {
    auth_failure: Option<AuthError>,
    script: Mutex<VecDeque<Result<(), DeliveryFailure>>>,
    sent: Mutex<Vec<OutgoingMessage>>,
    calls: Mutex<usize>,
}

impl ScriptedDeliveryClient {
    /// A client whose every call succeeds.
    pub fn succeeding() -> Self {
        Self::default()
    }

    /// A client that fails authentication.
    pub fn rejecting(error: AuthError) -> Self {
        Self {
            auth_failure: Some(error),
            ..Self::default()
        }
    }

    /// Outcomes for the first calls, in order.
    pub fn with_script(script: impl IntoIterator<Item = Result<(), DeliveryFailure>>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Messages that were accepted.
    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Total `send` calls, including failed ones.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DeliveryClient for ScriptedDeliveryClient {
    async fn authenticate(&self) -> Result<Session, AuthError> {
        match &self.auth_failure {
            Some(err) => Err(err.clone()),
            None => Ok(Session::new("me@example.com", "scripted")),
        }
    }

    async fn send(
        &self,
        _session: &Session,
        message: &OutgoingMessage,
    ) -> Result<DeliveryReceipt, DeliveryFailure> {
        let call = {
            let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);
            *calls += 1;
            *calls
        };
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(Ok(()));
        next?;
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(DeliveryReceipt::new(format!("scripted-{call}")))
    }
}
