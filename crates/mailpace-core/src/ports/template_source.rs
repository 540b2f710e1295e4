//! TemplateSource port - where message content comes from.
//!
//! Read fresh at the start of every run so edited content is picked up
//! without restarting a long-lived process.

use async_trait::async_trait;

use crate::domain::TemplateSet;
use crate::error::TemplateError;

#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn load_templates(&self) -> Result<TemplateSet, TemplateError>;
}
