//! RecipientStore port - the persisted recipient list.
//!
//! The store is the single source of truth: the engine loads it at the start
//! of every run and writes it back after each successful mutation.

use async_trait::async_trait;

use crate::domain::Recipient;
use crate::error::StoreError;

#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Load every row in store order.
    ///
    /// Returns `StoreError::NotFound` when the store does not exist yet.
    async fn load(&self) -> Result<Vec<Recipient>, StoreError>;

    /// Replace the stored rows with `recipients`, keeping their order.
    async fn save(&self, recipients: &[Recipient]) -> Result<(), StoreError>;
}
