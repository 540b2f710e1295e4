//! In-memory recipient store for tests and demos.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::Recipient;
use crate::error::StoreError;
use crate::ports::RecipientStore;

/// Store backed by a `Vec`. `None` behaves like a missing file.
#[derive(Debug, Default)]
pub struct InMemoryRecipientStore {
    rows: Mutex<Option<Vec<Recipient>>>,
    saves: Mutex<usize>,
}

impl InMemoryRecipientStore {
    pub fn new(rows: Vec<Recipient>) -> Self {
        Self {
            rows: Mutex::new(Some(rows)),
            saves: Mutex::new(0),
        }
    }

    /// A store that does not exist yet.
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Recipient> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecipientStore for InMemoryRecipientStore {
    async fn load(&self) -> Result<Vec<Recipient>, StoreError> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| StoreError::NotFound(PathBuf::from("<memory>")))
    }

    async fn save(&self, recipients: &[Recipient]) -> Result<(), StoreError> {
        *self.rows.lock().unwrap_or_else(PoisonError::into_inner) = Some(recipients.to_vec());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
