//! App - the campaign engine and everything it orchestrates.
//!
//! # Components
//! - **WindowGate**: mode of the day, open send windows
//! - **RateLimiter**: daily / hourly / batch gating and per-send jitter
//! - **TemplateRotator**: content variants for both workflows
//! - **RetryPolicy**: bounded backoff for transient failures
//! - **CampaignEngine**: one guarded run
//! - **EngineBuilder**: wiring with fail-fast checks
//! - **CampaignDriver**: start/cancel/status surface
//! - **DailySchedule**: the daily trigger

pub mod builder;
pub mod cancel;
pub mod driver;
pub mod engine;
pub mod rate_limiter;
pub mod retry;
pub mod rotator;
pub mod schedule;
pub mod status;
pub mod window;

pub use self::builder::{BuildError, EngineBuilder};
pub use self::cancel::{CancelHandle, CancelToken, cancel_pair};
pub use self::driver::{CampaignDriver, RunRejected, StartRun};
pub use self::engine::{CampaignEngine, EngineSettings, RunGuard};
pub use self::rate_limiter::{Gate, PacingRules, RateLimiter, RateLimits};
pub use self::retry::RetryPolicy;
pub use self::rotator::TemplateRotator;
pub use self::schedule::{DailySchedule, next_occurrence};
pub use self::status::{ModePreview, RecipientCounts, StatusReport};
pub use self::window::{NextWindow, SendWindow, WindowGate, day_name};
