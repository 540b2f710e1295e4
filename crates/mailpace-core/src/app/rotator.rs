//! Template rotator: independent uniform draws, with replacement.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::domain::{CampaignMode, MessageTemplate, TemplateSet};
use crate::error::TemplateError;

/// Picks content variants for both workflows.
///
/// Holds no rotation state besides the RNG, so the same template may come
/// up several times in a row.
pub struct TemplateRotator {
    templates: TemplateSet,
    rng: StdRng,
}

impl TemplateRotator {
    /// Fails if the workflow `mode` sends has no template. The other set may
    /// be empty.
    pub fn new(
        templates: TemplateSet,
        mode: CampaignMode,
        rng: StdRng,
    ) -> Result<Self, TemplateError> {
        match mode {
            CampaignMode::New if templates.new.is_empty() => Err(TemplateError::Empty("new")),
            CampaignMode::Followup if templates.followup.is_empty() => {
                Err(TemplateError::Empty("followup"))
            }
            _ => Ok(Self { templates, rng }),
        }
    }

    /// `None` only when the new-recipient set is empty.
    pub fn next_new_template(&mut self) -> Option<&MessageTemplate> {
        self.templates.new.choose(&mut self.rng)
    }

    pub fn next_followup_template(&mut self) -> Option<&MessageTemplate> {
        self.templates.followup.choose(&mut self.rng)
    }

    /// Shared RNG so jitter and rotation come from one seeded stream.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
