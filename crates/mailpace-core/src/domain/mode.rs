//! Campaign mode: which workflow is eligible on a given day.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignMode {
    /// Initial messages to pending recipients.
    New,
    /// Follow-ups to recipients contacted long enough ago.
    Followup,
    /// Rest day: nothing is sent.
    None,
}

impl CampaignMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignMode::New => "new",
            CampaignMode::Followup => "followup",
            CampaignMode::None => "none",
        }
    }

    pub fn is_sending(&self) -> bool {
        !matches!(self, CampaignMode::None)
    }
}

impl fmt::Display for CampaignMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
