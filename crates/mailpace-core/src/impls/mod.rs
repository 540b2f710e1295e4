//! Impls - port implementations.
//!
//! # Included
//! - **CsvRecipientStore**: the recipient list as a CSV file
//! - **InMemoryRecipientStore**: store for tests and demos
//! - **SystemClock / ManualClock**: real and virtual time
//! - **TomlTemplateSource / StaticTemplateSource**: message content
//! - **DryRunDeliveryClient**: credential-file auth, logs instead of sending
//! - **ScriptedDeliveryClient**: replays scripted outcomes
//!
//! The real provider transport is not part of this crate.

pub mod clock;
pub mod csv_store;
pub mod dry_run;
pub mod memory_store;
pub mod scripted;
pub mod templates;

pub use self::clock::{ManualClock, SystemClock};
pub use self::csv_store::CsvRecipientStore;
pub use self::dry_run::{DryRunDeliveryClient, FileSessionSource};
pub use self::memory_store::InMemoryRecipientStore;
pub use self::scripted::ScriptedDeliveryClient;
pub use self::templates::{StaticTemplateSource, TomlTemplateSource};
