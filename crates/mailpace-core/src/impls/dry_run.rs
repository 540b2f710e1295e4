//! DryRunDeliveryClient - authenticates like a real client but only logs.
//!
//! Authentication reads a credential file produced by an external login
//! step. The file's only contract toward the engine is: it yields a valid
//! session, or authentication fails.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::{DeliveryFailure, DeliveryReceipt, OutgoingMessage};
use crate::error::AuthError;
use crate::ports::{DeliveryClient, Session};

#[derive(Debug, Deserialize)]
struct StoredCredentials {
    sender: String,
    token: String,
}

/// Reads `{ "sender": "...", "token": "..." }` from a JSON file.
#[derive(Debug, Clone)]
pub struct FileSessionSource {
    path: PathBuf,
}

impl FileSessionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn session(&self) -> Result<Session, AuthError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::MissingCredentials(self.path.clone()));
            }
            Err(e) => return Err(AuthError::Invalid(e.to_string())),
        };
        let creds: StoredCredentials =
            serde_json::from_str(&raw).map_err(|e| AuthError::Invalid(e.to_string()))?;
        if creds.token.trim().is_empty() {
            return Err(AuthError::Invalid("empty token".into()));
        }
        Ok(Session::new(creds.sender, creds.token))
    }
}

#[derive(Debug, Clone)]
pub struct DryRunDeliveryClient {
    sessions: FileSessionSource,
}

impl DryRunDeliveryClient {
    pub fn new(sessions: FileSessionSource) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl DeliveryClient for DryRunDeliveryClient {
    async fn authenticate(&self) -> Result<Session, AuthError> {
        let session = self.sessions.session().await?;
        tracing::info!(sender = %session.sender, "dry-run session ready");
        Ok(session)
    }

    async fn send(
        &self,
        session: &Session,
        message: &OutgoingMessage,
    ) -> Result<DeliveryReceipt, DeliveryFailure> {
        tracing::info!(
            from = %session.sender,
            to = %message.to,
            subject = %message.subject,
            attachment = ?message.attachment.as_ref().map(|a| a.file_name()),
            body_len = message.body.len(),
            "dry-run send"
        );
        Ok(DeliveryReceipt::new(format!("dry-run-{}", ulid::Ulid::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_credentials_fail_authentication() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let client = DryRunDeliveryClient::new(FileSessionSource::new(&path));
        assert_eq!(
            client.authenticate().await.unwrap_err(),
            AuthError::MissingCredentials(path)
        );
    }

    #[tokio::test]
    async fn garbage_credentials_are_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "not json").unwrap();
        let err = FileSessionSource::new(&path).session().await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }

    #[tokio::test]
    async fn valid_credentials_send_nothing_but_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"sender":"me@x.io","token":"abc"}"#).unwrap();

        let client = DryRunDeliveryClient::new(FileSessionSource::new(&path));
        let session = client.authenticate().await.unwrap();
        assert_eq!(session.sender, "me@x.io");

        let receipt = client
            .send(
                &session,
                &OutgoingMessage {
                    to: "a@x.io".into(),
                    subject: "hi".into(),
                    body: "Hi Ana".into(),
                    attachment: None,
                },
            )
            .await
            .unwrap();
        assert!(receipt.message_id.starts_with("dry-run-"));
    }
}
