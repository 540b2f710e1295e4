//! Template sources.
//!
//! - **TomlTemplateSource**: re-reads a TOML file on every call, so edits
//!   take effect at the next run.
//! - **StaticTemplateSource**: fixed content, for tests and embedding.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::TemplateSet;
use crate::error::TemplateError;
use crate::ports::TemplateSource;

/// File layout:
///
/// ```toml
/// [[new]]
/// subject = "Quick question"
/// body = "Hi {name}, ..."
///
/// [[followup]]
/// subject = "Following up"
/// body = "Hi {name}, just checking in ..."
/// ```
#[derive(Debug, Clone)]
pub struct TomlTemplateSource {
    path: PathBuf,
}

impl TomlTemplateSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TemplateSource for TomlTemplateSource {
    async fn load_templates(&self) -> Result<TemplateSet, TemplateError> {
        let content =
            tokio::fs::read_to_string(&self.path)
                .await
                .map_err(|source| TemplateError::Io {
                    path: self.path.clone(),
                    source,
                })?;
        let set: TemplateSet = toml::from_str(&content)?;
        tracing::debug!(
            path = %self.path.display(),
            new = set.new.len(),
            followup = set.followup.len(),
            "loaded templates"
        );
        Ok(set)
    }
}

#[derive(Debug, Clone)]
pub struct StaticTemplateSource {
    set: TemplateSet,
}

impl StaticTemplateSource {
    pub fn new(set: TemplateSet) -> Self {
        Self { set }
    }
}

#[async_trait]
impl TemplateSource for StaticTemplateSource {
    async fn load_templates(&self) -> Result<TemplateSet, TemplateError> {
        Ok(self.set.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn toml_source_rereads_on_every_call() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.toml");
        std::fs::write(
            &path,
            r#"
            [[new]]
            subject = "Hello"
            body = "Hi {name}"

            [[followup]]
            subject = "Again"
            body = "Hi again {name}"
            "#,
        )
        .unwrap();

        let source = TomlTemplateSource::new(&path);
        let first = source.load_templates().await.unwrap();
        assert_eq!(first.new[0].subject, "Hello");
        assert_eq!(first.followup.len(), 1);

        std::fs::write(
            &path,
            r#"
            [[new]]
            subject = "Edited"
            body = "Yo {name}"
            "#,
        )
        .unwrap();
        let second = source.load_templates().await.unwrap();
        assert_eq!(second.new[0].subject, "Edited");
        assert!(second.followup.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let source = TomlTemplateSource::new("/nonexistent/templates.toml");
        assert!(matches!(
            source.load_templates().await,
            Err(TemplateError::Io { .. })
        ));
    }
}
