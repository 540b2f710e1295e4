//! Message templates.

use serde::{Deserialize, Serialize};

/// The single placeholder substituted at render time.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// A subject plus a body template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Substitute the recipient name. A body without the placeholder is
    /// returned unchanged.
    pub fn render(&self, name: &str) -> String {
        self.body.replace(NAME_PLACEHOLDER, name)
    }
}

/// Content variants for both workflows.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateSet {
    #[serde(default)]
    pub new: Vec<MessageTemplate>,
    #[serde(default)]
    pub followup: Vec<MessageTemplate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_every_placeholder() {
        let t = MessageTemplate::new("hi", "Hi {name},\nbye {name}");
        assert_eq!(t.render("Ana"), "Hi Ana,\nbye Ana");
    }

    #[test]
    fn render_without_placeholder_is_noop() {
        let t = MessageTemplate::new("hi", "Hello there");
        assert_eq!(t.render("Ana"), "Hello there");
    }
}
