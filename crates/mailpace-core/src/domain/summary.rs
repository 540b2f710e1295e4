//! Run summary: the only thing a campaign run hands back to its caller.

use serde::{Deserialize, Serialize};

use super::CampaignMode;

/// Aggregate result of one engine invocation.
///
/// Every exit path of a run (including configuration and provider errors)
/// resolves to one of these; `message` carries the human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub mode: CampaignMode,
    pub sent_new: u32,
    pub sent_followup: u32,
    pub failed: u32,
    pub message: String,
}

impl RunSummary {
    pub fn new(mode: CampaignMode) -> Self {
        Self {
            mode,
            sent_new: 0,
            sent_followup: 0,
            failed: 0,
            message: String::new(),
        }
    }

    /// Early return with all counts zero.
    pub fn early(mode: CampaignMode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(mode)
        }
    }

    pub fn total_sent(&self) -> u32 {
        self.sent_new + self.sent_followup
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}
