//! Status views derived from the recipient store.

use serde::{Deserialize, Serialize};

use crate::app::window::NextWindow;
use crate::domain::{CampaignMode, DeliveryStatus, FollowUpStatus, Recipient, RunSummary};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientCounts {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
    pub sent_followups: usize,
}

impl RecipientCounts {
    pub fn tally(recipients: &[Recipient]) -> Self {
        let mut counts = Self {
            total: recipients.len(),
            ..Self::default()
        };
        for r in recipients {
            match r.status() {
                DeliveryStatus::Pending => counts.pending += 1,
                DeliveryStatus::Sent => counts.sent += 1,
                DeliveryStatus::Failed => counts.failed += 1,
            }
            if r.follow_up_status() == FollowUpStatus::Sent {
                counts.sent_followups += 1;
            }
        }
        counts
    }
}

/// Answer to `get_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    #[serde(flatten)]
    pub counts: RecipientCounts,
    pub is_running: bool,
    /// The configured follow-up attachment exists on disk.
    pub has_attachment: bool,
    pub has_credentials: bool,
    pub last_run: Option<RunSummary>,
}

/// Answer to `get_mode_preview`. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModePreview {
    pub mode: CampaignMode,
    pub day_name: String,
    /// Label of the window open right now, if any.
    pub open_window: Option<String>,
    pub next_window: Option<NextWindow>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DateCell;
    use chrono::NaiveDate;

    #[test]
    fn tally_counts_every_state() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut followed = Recipient::new("c@x.io", None);
        followed.mark_sent(d);
        followed.mark_followed_up(d);
        let mut failed = Recipient::new("b@x.io", None);
        failed.mark_failed();
        let rows = vec![
            Recipient::new("a@x.io", None),
            failed,
            followed,
            Recipient::from_stored(
                "d@x.io",
                None,
                DeliveryStatus::Sent,
                Some(DateCell::Parsed(d)),
                FollowUpStatus::Pending,
                None,
            ),
        ];

        assert_eq!(
            RecipientCounts::tally(&rows),
            RecipientCounts {
                total: 4,
                pending: 1,
                sent: 2,
                failed: 1,
                sent_followups: 1,
            }
        );
    }

    #[test]
    fn report_serializes_flat() {
        let report = StatusReport {
            counts: RecipientCounts::default(),
            is_running: true,
            has_attachment: false,
            has_credentials: true,
            last_run: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["total"], 0);
        assert_eq!(json["is_running"], true);
        assert_eq!(json["has_credentials"], true);
    }
}
