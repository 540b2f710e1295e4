//! mailpace-core
//!
//! Paced outbound messaging: a time-aware, rate-limited campaign engine
//! that persists progress after every send.
//!
//! # Modules
//! - **domain**: recipients, modes, templates, outcomes, run summaries
//! - **ports**: Clock, RecipientStore, DeliveryClient, TemplateSource
//! - **app**: window gate, rate limiter, rotator, engine, driver, schedule
//! - **impls**: CSV / in-memory stores, clocks, template sources, delivery clients
//! - **config**: TOML configuration
//! - **error**: error types

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod ports;

pub use app::{CampaignDriver, CampaignEngine, EngineBuilder, EngineSettings};
pub use config::CampaignConfig;
pub use domain::{CampaignMode, Recipient, RunSummary};
