//! EngineBuilder - wiring a CampaignEngine from its collaborators.
//!
//! Fail-fast: `build()` reports every missing collaborator at once instead
//! of failing on the first run.
//!
//! # 学習ポイント
//! - Builder パターン (`Option<Arc<dyn Trait>>` を集めて最後に検証)
//! - 具体型も `Arc` 共有済みの値も受け取れる二種類の setter

use std::sync::Arc;

use crate::app::engine::{CampaignEngine, EngineSettings};
use crate::impls::SystemClock;
use crate::ports::{Clock, DeliveryClient, RecipientStore, TemplateSource};

/// # Example
/// ```ignore
/// let engine = EngineBuilder::new()
///     .store(CsvRecipientStore::new("emails.csv"))
///     .client(DryRunDeliveryClient::new(FileSessionSource::new("token.json")))
///     .templates(TomlTemplateSource::new("templates.toml"))
///     .settings(EngineSettings::from_config(&config))
///     .build()?;
/// ```
///
/// The clock defaults to `SystemClock` and the settings to the config
/// defaults.
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Arc<dyn RecipientStore>>,
    client: Option<Arc<dyn DeliveryClient>>,
    templates: Option<Arc<dyn TemplateSource>>,
    clock: Option<Arc<dyn Clock>>,
    settings: Option<EngineSettings>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing collaborators: {0:?}")]
    Missing(Vec<&'static str>),
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(self, store: impl RecipientStore + 'static) -> Self {
        self.shared_store(Arc::new(store))
    }

    pub fn shared_store(mut self, store: Arc<dyn RecipientStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn client(self, client: impl DeliveryClient + 'static) -> Self {
        self.shared_client(Arc::new(client))
    }

    pub fn shared_client(mut self, client: Arc<dyn DeliveryClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn templates(mut self, templates: impl TemplateSource + 'static) -> Self {
        self.templates = Some(Arc::new(templates));
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn build(self) -> Result<CampaignEngine, BuildError> {
        let mut missing = Vec::new();
        if self.store.is_none() {
            missing.push("store");
        }
        if self.client.is_none() {
            missing.push("client");
        }
        if self.templates.is_none() {
            missing.push("templates");
        }

        match (self.store, self.client, self.templates) {
            (Some(store), Some(client), Some(templates)) => Ok(CampaignEngine::new(
                store,
                client,
                templates,
                self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                self.settings.unwrap_or_default(),
            )),
            _ => Err(BuildError::Missing(missing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TemplateSet;
    use crate::impls::{InMemoryRecipientStore, ScriptedDeliveryClient, StaticTemplateSource};

    #[test]
    fn build_success() {
        let engine = EngineBuilder::new()
            .store(InMemoryRecipientStore::new(vec![]))
            .client(ScriptedDeliveryClient::succeeding())
            .templates(StaticTemplateSource::new(TemplateSet::default()))
            .build();
        assert!(engine.is_ok());
    }

    #[test]
    fn build_reports_all_missing_collaborators() {
        let engine = EngineBuilder::new()
            .client(ScriptedDeliveryClient::succeeding())
            .build();
        assert!(matches!(
            engine,
            Err(BuildError::Missing(missing)) if missing == vec!["store", "templates"]
        ));
    }
}
