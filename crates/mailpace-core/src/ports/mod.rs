//! Ports - collaborator seams of the campaign engine.
//!
//! Each trait hides one external concern so the engine can be exercised
//! end-to-end against in-memory implementations.

pub mod clock;
pub mod delivery_client;
pub mod recipient_store;
pub mod template_source;

pub use self::clock::Clock;
pub use self::delivery_client::{DeliveryClient, Session};
pub use self::recipient_store::RecipientStore;
pub use self::template_source::TemplateSource;
