//! CampaignDriver - the outward surface over one engine.
//!
//! - `start_run()`: spawn a run in the background, or reject it
//! - `run_now()`: run in the caller's task
//! - `get_status()` / `get_mode_preview()`: read-only views
//! - `cancel()`: abort the active run at its next suspension point
//!
//! # 設計
//! - run の排他は engine 側の run slot に一本化 (driver は queue を持たない)
//! - store が未作成でも status は 0 件として返す

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::app::cancel::{CancelHandle, CancelToken, cancel_pair};
use crate::app::engine::{BUSY_MESSAGE, CampaignEngine, RunGuard};
use crate::app::status::{ModePreview, RecipientCounts, StatusReport};
use crate::app::window::day_name;
use crate::domain::RunSummary;
use crate::error::StoreError;

/// Answer to `start_run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRun {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StartRun {
    fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("a campaign run is already active")]
pub struct RunRejected;

pub struct CampaignDriver {
    engine: Arc<CampaignEngine>,
    cancel: CancelHandle,
    last_run: Arc<Mutex<Option<RunSummary>>>,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl CampaignDriver {
    pub fn new(engine: Arc<CampaignEngine>) -> Self {
        let (cancel, _) = cancel_pair();
        Self {
            engine,
            cancel,
            last_run: Arc::new(Mutex::new(None)),
            background: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &Arc<CampaignEngine> {
        &self.engine
    }

    /// Start a run in a background task. Rejected while a run is active;
    /// never queued.
    pub fn start_run(&self) -> StartRun {
        let Some(guard) = self.engine.try_begin() else {
            return StartRun::rejected(BUSY_MESSAGE);
        };
        let token = self.begin(&guard);
        let engine = Arc::clone(&self.engine);
        let last_run = Arc::clone(&self.last_run);

        let join = tokio::spawn(async move {
            let summary = engine.run_guarded(guard, token).await;
            *last_run.lock().unwrap_or_else(PoisonError::into_inner) = Some(summary);
        });
        *self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(join);
        StartRun::accepted()
    }

    /// Run in the current task and return its summary.
    pub async fn run_now(&self) -> Result<RunSummary, RunRejected> {
        let guard = self.engine.try_begin().ok_or(RunRejected)?;
        let token = self.begin(&guard);
        let summary = self.engine.run_guarded(guard, token).await;
        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = Some(summary.clone());
        Ok(summary)
    }

    /// Wait for the last background run, if any.
    pub async fn join(&self) {
        let join = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(join) = join {
            // a panicked run already released its slot through the guard
            let _ = join.await;
        }
    }

    /// Request cancellation of the active run. Returns whether one was active.
    pub fn cancel(&self) -> bool {
        let active = self.engine.is_running();
        if active {
            tracing::info!("cancellation requested");
            self.cancel.cancel();
        }
        active
    }

    pub fn last_run(&self) -> Option<RunSummary> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Counts derived by scanning the store as it is now. A store that does
    /// not exist yet counts as empty.
    pub async fn get_status(&self) -> Result<StatusReport, StoreError> {
        let counts = match self.engine.store().load().await {
            Ok(recipients) => RecipientCounts::tally(&recipients),
            Err(StoreError::NotFound(_)) => RecipientCounts::default(),
            Err(e) => return Err(e),
        };
        let settings = self.engine.settings();
        Ok(StatusReport {
            counts,
            is_running: self.engine.is_running(),
            has_attachment: is_file(settings.attachment.as_deref()),
            has_credentials: is_file(settings.credentials.as_deref()),
            last_run: self.last_run(),
        })
    }

    pub fn get_mode_preview(&self, now: NaiveDateTime) -> ModePreview {
        let settings = self.engine.settings();
        ModePreview {
            mode: settings.gate.decide_mode(now),
            day_name: day_name(now.weekday()).to_string(),
            open_window: settings.gate.in_send_window(now).map(|w| w.label.clone()),
            next_window: settings.gate.next_window(now),
        }
    }

    /// Fresh cancellation signal for a run that holds `_guard`.
    fn begin(&self, _guard: &RunGuard) -> CancelToken {
        self.cancel.reset();
        self.cancel.token()
    }
}

fn is_file(path: Option<&Path>) -> bool {
    path.is_some_and(Path::is_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::engine::EngineSettings;
    use crate::domain::{CampaignMode, MessageTemplate, Recipient, TemplateSet};
    use crate::impls::{
        InMemoryRecipientStore, ManualClock, ScriptedDeliveryClient, StaticTemplateSource,
    };
    use chrono::NaiveDate;

    fn monday(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 11)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn driver(rows: Vec<Recipient>, store_missing: bool) -> CampaignDriver {
        let mut settings = EngineSettings::default();
        settings.attachment = None;
        settings.credentials = None;
        driver_with(rows, store_missing, settings)
    }

    fn driver_with(
        rows: Vec<Recipient>,
        store_missing: bool,
        mut settings: EngineSettings,
    ) -> CampaignDriver {
        let store = if store_missing {
            InMemoryRecipientStore::missing()
        } else {
            InMemoryRecipientStore::new(rows)
        };
        let templates = TemplateSet {
            new: vec![MessageTemplate::new("Hello", "Hi {name}")],
            followup: vec![MessageTemplate::new("Again", "Hi {name}")],
        };
        settings.rng_seed = Some(3);
        let engine = CampaignEngine::new(
            Arc::new(store),
            Arc::new(ScriptedDeliveryClient::succeeding()),
            Arc::new(StaticTemplateSource::new(templates)),
            Arc::new(ManualClock::new(monday(10, 0))),
            settings,
        );
        CampaignDriver::new(Arc::new(engine))
    }

    fn rows(n: usize) -> Vec<Recipient> {
        (1..=n)
            .map(|i| Recipient::new(format!("r{i}@example.com"), None))
            .collect()
    }

    #[tokio::test]
    async fn start_run_rejects_while_active() {
        let d = driver(rows(2), false);
        let guard = d.engine().try_begin().unwrap();

        let started = d.start_run();
        assert!(!started.accepted);
        assert_eq!(started.reason.as_deref(), Some(BUSY_MESSAGE));
        assert!(d.run_now().await.is_err());

        drop(guard);
        assert!(d.start_run().accepted);
        d.join().await;
        assert_eq!(d.last_run().unwrap().sent_new, 2);
        assert!(!d.engine().is_running());
    }

    #[tokio::test]
    async fn status_reflects_the_store() {
        let d = driver(rows(3), false);
        let before = d.get_status().await.unwrap();
        assert_eq!(before.counts.pending, 3);
        assert!(before.last_run.is_none());

        let summary = d.run_now().await.unwrap();
        assert_eq!(summary.sent_new, 3);

        let after = d.get_status().await.unwrap();
        assert_eq!(after.counts.total, 3);
        assert_eq!(after.counts.sent, 3);
        assert_eq!(after.counts.pending, 0);
        assert!(!after.is_running);
        assert_eq!(after.last_run, Some(summary));
    }

    #[tokio::test]
    async fn missing_store_reports_zero_counts() {
        let d = driver(vec![], true);
        let status = d.get_status().await.unwrap();
        assert_eq!(status.counts, RecipientCounts::default());
        assert!(!status.has_attachment);
        assert!(!status.has_credentials);
        assert_eq!(d.run_now().await.unwrap().message, "store not found");
    }

    #[tokio::test]
    async fn status_reports_attachment_and_credentials_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let attachment = dir.path().join("brochure.pdf");
        let credentials = dir.path().join("token.json");
        std::fs::write(&credentials, b"{}").unwrap();

        let mut settings = EngineSettings::default();
        settings.attachment = Some(attachment.clone());
        settings.credentials = Some(credentials);
        let d = driver_with(rows(1), false, settings);

        let status = d.get_status().await.unwrap();
        assert!(!status.has_attachment);
        assert!(status.has_credentials);

        std::fs::write(&attachment, b"%PDF").unwrap();
        assert!(d.get_status().await.unwrap().has_attachment);
    }

    #[tokio::test]
    async fn preview_is_read_only() {
        let d = driver(rows(1), false);
        let preview = d.get_mode_preview(monday(10, 0));
        assert_eq!(preview.mode, CampaignMode::New);
        assert_eq!(preview.day_name, "Monday");
        assert_eq!(preview.open_window.as_deref(), Some("morning"));
        assert_eq!(preview.next_window.unwrap().label, "afternoon");

        let saturday = d.get_mode_preview(monday(10, 0) + chrono::Duration::days(5));
        assert_eq!(saturday.mode, CampaignMode::None);
        assert_eq!(saturday.day_name, "Saturday");

        assert_eq!(d.get_status().await.unwrap().counts.pending, 1);
    }

    #[tokio::test]
    async fn cancel_without_active_run_is_a_noop() {
        let d = driver(rows(1), false);
        assert!(!d.cancel());
        // a stale cancellation never leaks into the next run
        assert_eq!(d.run_now().await.unwrap().sent_new, 1);
    }
}
