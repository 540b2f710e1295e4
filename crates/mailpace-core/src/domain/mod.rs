//! Domain model (recipients, modes, templates, outcomes, run summaries).
//!
//! Plain data only: nothing here performs I/O or looks at the clock.

pub mod attempt;
pub mod mode;
pub mod outcome;
pub mod recipient;
pub mod summary;
pub mod template;

pub use attempt::{Attachment, OutgoingMessage, SendAttempt};
pub use mode::CampaignMode;
pub use outcome::{DeliveryFailure, DeliveryReceipt, FailureKind};
pub use recipient::{
    DateCell, DeliveryStatus, FollowUpBlock, FollowUpStatus, Recipient, DEFAULT_NAME,
};
pub use summary::RunSummary;
pub use template::{MessageTemplate, TemplateSet, NAME_PLACEHOLDER};
