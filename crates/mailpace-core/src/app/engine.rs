//! CampaignEngine - one guarded campaign run.
//!
//! # Flow
//! 1. RecipientStore::load() (missing store -> "store not found")
//! 2. DeliveryClient::authenticate()
//! 3. WindowGate::decide_mode() / in_send_window()
//! 4. TemplateSource::load_templates() (re-read every run)
//! 5. new-recipient loop or follow-up loop, write-through after each success
//! 6. final save, RunSummary
//!
//! Every exit path resolves to a `RunSummary`; nothing here returns `Err`.
//!
//! # 学習ポイント
//! - `RunGuard` の Drop で run slot を解放 (panic や早期 return でも漏れない)
//! - suspension point ごとに `tokio::select!` で CancelToken を監視
//! - 待機のあとは rate limiter と send window の両方を再判定してから送る

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{Datelike, NaiveDateTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::Instrument;

use crate::app::cancel::CancelToken;
use crate::app::rate_limiter::{Gate, PacingRules, RateLimiter, RateLimits};
use crate::app::retry::RetryPolicy;
use crate::app::rotator::TemplateRotator;
use crate::app::window::{NextWindow, WindowGate, day_name};
use crate::config::CampaignConfig;
use crate::domain::{
    Attachment, CampaignMode, DeliveryFailure, DeliveryReceipt, FailureKind, FollowUpBlock,
    OutgoingMessage, Recipient, RunSummary, SendAttempt,
};
use crate::error::StoreError;
use crate::ports::{Clock, DeliveryClient, RecipientStore, Session, TemplateSource};

pub const BUSY_MESSAGE: &str = "a campaign run is already active";
pub const STORE_NOT_FOUND_MESSAGE: &str = "store not found";
pub const CANCELLED_MESSAGE: &str = "cancelled";

/// Policy half of the engine. Snapshotted at the start of every run, so a
/// reload only affects the next run.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub gate: WindowGate,
    pub limits: RateLimits,
    pub followup_pacing: PacingRules,
    pub retry: RetryPolicy,
    pub followup_threshold_days: i64,
    pub attachment: Option<PathBuf>,
    /// Where the delivery client keeps its credentials. Only reported.
    pub credentials: Option<PathBuf>,
    pub rng_seed: Option<u64>,
}

impl EngineSettings {
    pub fn from_config(config: &CampaignConfig) -> Self {
        Self {
            gate: config.window_gate(),
            limits: config.rate_limits(),
            followup_pacing: config.followup_pacing(),
            retry: config.retry_policy(),
            followup_threshold_days: config.followup.threshold_days,
            attachment: config.paths.attachment.clone(),
            credentials: Some(config.paths.credentials.clone()),
            rng_seed: config.rng_seed,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&CampaignConfig::default())
    }
}

/// Held for the duration of a run; releases the run slot on drop, whatever
/// the exit path.
#[derive(Debug)]
pub struct RunGuard {
    slot: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}

pub struct CampaignEngine {
    store: Arc<dyn RecipientStore>,
    client: Arc<dyn DeliveryClient>,
    templates: Arc<dyn TemplateSource>,
    clock: Arc<dyn Clock>,
    settings: Mutex<Arc<EngineSettings>>,
    running: Arc<AtomicBool>,
}

/// Why a sending loop stopped.
#[derive(Debug)]
enum LoopEnd {
    Completed,
    DailyCap,
    Halted(DeliveryFailure),
    Cancelled,
    StoreWrite(StoreError),
    /// The send window closed while the loop was waiting.
    OutsideWindow(Option<NextWindow>),
    /// The rotator has nothing to draw for this workflow.
    NoTemplates(CampaignMode),
}

/// Result of one delivery including its retries.
#[derive(Debug)]
enum Delivery {
    Delivered(DeliveryReceipt),
    Failed(DeliveryFailure),
    Cancelled,
}

#[derive(Debug)]
struct Cancelled;

/// Everything a sending loop mutates.
struct RunState {
    recipients: Vec<Recipient>,
    limiter: RateLimiter,
    rotator: TemplateRotator,
    session: Session,
    summary: RunSummary,
    cancel: CancelToken,
}

impl CampaignEngine {
    pub fn new(
        store: Arc<dyn RecipientStore>,
        client: Arc<dyn DeliveryClient>,
        templates: Arc<dyn TemplateSource>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            client,
            templates,
            clock,
            settings: Mutex::new(Arc::new(settings)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecipientStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn settings(&self) -> Arc<EngineSettings> {
        Arc::clone(&self.settings.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the policy used by subsequent runs. A run in progress keeps
    /// the settings it started with.
    pub fn update_settings(&self, settings: EngineSettings) {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = Arc::new(settings);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the single run slot. `None` while another run holds it.
    pub fn try_begin(&self) -> Option<RunGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                slot: Arc::clone(&self.running),
            })
    }

    /// One run, not cancellable. Rejected with `BUSY_MESSAGE` when a run is
    /// already active.
    pub async fn run_campaign(&self) -> RunSummary {
        self.run_campaign_with_cancel(CancelToken::never()).await
    }

    pub async fn run_campaign_with_cancel(&self, cancel: CancelToken) -> RunSummary {
        match self.try_begin() {
            Some(guard) => self.run_guarded(guard, cancel).await,
            None => {
                tracing::warn!("run rejected: another run is active");
                RunSummary::early(CampaignMode::None, BUSY_MESSAGE)
            }
        }
    }

    /// Run with a slot already claimed through `try_begin`.
    pub async fn run_guarded(&self, guard: RunGuard, cancel: CancelToken) -> RunSummary {
        let run_id = ulid::Ulid::new();
        let span = tracing::info_span!("campaign_run", %run_id);
        let summary = self.execute(cancel).instrument(span).await;
        drop(guard);
        summary
    }

    async fn execute(&self, cancel: CancelToken) -> RunSummary {
        let settings = self.settings();

        let recipients = match self.store.load().await {
            Ok(rows) => rows,
            Err(StoreError::NotFound(path)) => {
                tracing::info!(path = %path.display(), "recipient store not found");
                return RunSummary::early(CampaignMode::None, STORE_NOT_FOUND_MESSAGE);
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot load recipient store");
                return RunSummary::early(CampaignMode::None, format!("cannot load store: {e}"));
            }
        };

        let session = match self.client.authenticate().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "authentication failed");
                return RunSummary::early(
                    CampaignMode::None,
                    format!("authentication failed: {e}"),
                );
            }
        };

        let now = self.clock.now();
        let mode = settings.gate.decide_mode(now);
        let day = day_name(now.weekday());
        if !mode.is_sending() {
            tracing::info!(day, "no campaign scheduled today");
            return RunSummary::early(mode, format!("no campaign scheduled on {day}"));
        }

        let Some(window) = settings.gate.in_send_window(now) else {
            let message = outside_window_message(settings.gate.next_window(now));
            tracing::info!(%mode, "{message}");
            return RunSummary::early(mode, message);
        };
        tracing::info!(%mode, window = %window.label, recipients = recipients.len(), "campaign run started");

        let rng = match settings.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let rotator = match self
            .templates
            .load_templates()
            .await
            .and_then(|set| TemplateRotator::new(set, mode, rng))
        {
            Ok(rotator) => rotator,
            Err(e) => {
                tracing::error!(error = %e, "templates unavailable");
                return RunSummary::early(mode, format!("templates unavailable: {e}"));
            }
        };

        let mut state = RunState {
            recipients,
            limiter: RateLimiter::new(settings.limits.clone(), now),
            rotator,
            session,
            summary: RunSummary::new(mode),
            cancel,
        };

        let end = match mode {
            CampaignMode::New => self.send_new(&settings, &mut state).await,
            CampaignMode::Followup => self.send_followups(&settings, &mut state).await,
            CampaignMode::None => LoopEnd::Completed,
        };

        let mut message = match end {
            LoopEnd::Completed => "completed".to_string(),
            LoopEnd::DailyCap => format!("daily cap of {} reached", settings.limits.daily_cap),
            LoopEnd::Halted(failure) => {
                tracing::error!(kind = ?failure.kind, reason = %failure.reason, "run halted");
                format!("halted: {failure}")
            }
            LoopEnd::Cancelled => {
                tracing::warn!("run cancelled");
                CANCELLED_MESSAGE.to_string()
            }
            LoopEnd::StoreWrite(e) => {
                tracing::error!(error = %e, "write-through failed; run stopped");
                format!("store write failed: {e}")
            }
            LoopEnd::OutsideWindow(next) => {
                tracing::info!("send window closed; run stopped");
                outside_window_message(next)
            }
            LoopEnd::NoTemplates(mode) => format!("no {mode} templates configured"),
        };

        if let Err(e) = self.store.save(&state.recipients).await {
            tracing::error!(error = %e, "final save failed");
            message = format!("{message}; final save failed: {e}");
        }

        let summary = state.summary.with_message(message);
        tracing::info!(
            mode = %summary.mode,
            sent_new = summary.sent_new,
            sent_followup = summary.sent_followup,
            failed = summary.failed,
            message = %summary.message,
            "campaign run finished"
        );
        summary
    }

    async fn send_new(&self, settings: &EngineSettings, state: &mut RunState) -> LoopEnd {
        for idx in 0..state.recipients.len() {
            if !state.recipients[idx].is_pending() {
                continue;
            }
            if state.limiter.daily_cap_reached() {
                return LoopEnd::DailyCap;
            }

            if !state.recipients[idx].has_plausible_address() {
                let recipient = &mut state.recipients[idx];
                tracing::warn!(email = %recipient.email(), "invalid address; marked failed");
                recipient.mark_failed();
                state.summary.failed += 1;
                if let Err(e) = self.store.save(&state.recipients).await {
                    return LoopEnd::StoreWrite(e);
                }
                continue;
            }

            if let Some(end) = self.wait_for_gate(settings, state, PacingRules::full()).await {
                return end;
            }

            let recipient = &state.recipients[idx];
            let Some(template) = state.rotator.next_new_template() else {
                return LoopEnd::NoTemplates(CampaignMode::New);
            };
            let message = OutgoingMessage {
                to: recipient.email().to_string(),
                subject: template.subject.clone(),
                body: template.render(recipient.display_name()),
                attachment: None,
            };

            match self
                .deliver(&state.session, message, &settings.retry, &mut state.cancel)
                .await
            {
                Delivery::Delivered(receipt) => {
                    let today = self.clock.now().date();
                    let recipient = &mut state.recipients[idx];
                    recipient.mark_sent(today);
                    tracing::info!(
                        email = %recipient.email(),
                        message_id = %receipt.message_id,
                        "initial message sent"
                    );
                    if let Err(e) = self.store.save(&state.recipients).await {
                        return LoopEnd::StoreWrite(e);
                    }
                    state.limiter.record_send();
                    state.summary.sent_new += 1;
                    if let Some(end) = self.jitter(state).await {
                        return end;
                    }
                }
                Delivery::Failed(failure) if failure.kind.is_run_fatal() => {
                    return LoopEnd::Halted(failure);
                }
                Delivery::Failed(failure) => {
                    let recipient = &mut state.recipients[idx];
                    tracing::warn!(
                        email = %recipient.email(),
                        kind = ?failure.kind,
                        reason = %failure.reason,
                        "initial message failed"
                    );
                    recipient.mark_failed();
                    state.summary.failed += 1;
                    if let Err(e) = self.store.save(&state.recipients).await {
                        return LoopEnd::StoreWrite(e);
                    }
                }
                Delivery::Cancelled => return LoopEnd::Cancelled,
            }
        }
        LoopEnd::Completed
    }

    async fn send_followups(&self, settings: &EngineSettings, state: &mut RunState) -> LoopEnd {
        let attachment = settings
            .attachment
            .as_deref()
            .and_then(Attachment::if_exists);
        if let Some(a) = &attachment {
            tracing::debug!(attachment = %a.file_name(), "follow-ups carry an attachment");
        }

        for idx in 0..state.recipients.len() {
            let today = self.clock.now().date();
            match state.recipients[idx].follow_up_eligibility(today, settings.followup_threshold_days)
            {
                Ok(()) => {}
                Err(FollowUpBlock::MalformedDateSent(raw)) => {
                    tracing::warn!(
                        email = %state.recipients[idx].email(),
                        date_sent = %raw,
                        "unreadable date_sent; skipped"
                    );
                    continue;
                }
                Err(_) => continue,
            }
            if state.limiter.daily_cap_reached() {
                return LoopEnd::DailyCap;
            }

            if let Some(end) = self
                .wait_for_gate(settings, state, settings.followup_pacing)
                .await
            {
                return end;
            }

            let recipient = &state.recipients[idx];
            let Some(template) = state.rotator.next_followup_template() else {
                return LoopEnd::NoTemplates(CampaignMode::Followup);
            };
            let message = OutgoingMessage {
                to: recipient.email().to_string(),
                subject: template.subject.clone(),
                body: template.render(recipient.display_name()),
                attachment: attachment.clone(),
            };

            match self
                .deliver(&state.session, message, &settings.retry, &mut state.cancel)
                .await
            {
                Delivery::Delivered(receipt) => {
                    let today = self.clock.now().date();
                    let recipient = &mut state.recipients[idx];
                    // eligibility already required status sent with a date
                    let marked = recipient.mark_followed_up(today);
                    debug_assert!(marked, "follow-up sent to an ineligible row");
                    tracing::info!(
                        email = %recipient.email(),
                        message_id = %receipt.message_id,
                        "follow-up sent"
                    );
                    if let Err(e) = self.store.save(&state.recipients).await {
                        return LoopEnd::StoreWrite(e);
                    }
                    state.limiter.record_send();
                    state.summary.sent_followup += 1;
                    if let Some(end) = self.jitter(state).await {
                        return end;
                    }
                }
                Delivery::Failed(failure) if failure.kind.is_run_fatal() => {
                    return LoopEnd::Halted(failure);
                }
                Delivery::Failed(failure) => {
                    tracing::warn!(
                        email = %state.recipients[idx].email(),
                        kind = ?failure.kind,
                        reason = %failure.reason,
                        "follow-up failed"
                    );
                    state.summary.failed += 1;
                }
                Delivery::Cancelled => return LoopEnd::Cancelled,
            }
        }
        LoopEnd::Completed
    }

    /// Apply the rate limiter until it allows a send, then confirm a send
    /// window is still open. `Some` means the loop has to stop.
    async fn wait_for_gate(
        &self,
        settings: &EngineSettings,
        state: &mut RunState,
        rules: PacingRules,
    ) -> Option<LoopEnd> {
        loop {
            if state.cancel.is_cancelled() {
                return Some(LoopEnd::Cancelled);
            }
            let now = self.clock.now();
            match state.limiter.check(now, rules) {
                Gate::Proceed => {
                    if settings.gate.in_send_window(now).is_some() {
                        return None;
                    }
                    return Some(LoopEnd::OutsideWindow(settings.gate.next_window(now)));
                }
                Gate::Stop => return Some(LoopEnd::DailyCap),
                Gate::WaitUntil(deadline) => {
                    tracing::info!(until = %deadline, "hourly cap reached; waiting");
                    if self.pause_until(deadline, &mut state.cancel).await.is_err() {
                        return Some(LoopEnd::Cancelled);
                    }
                    state.limiter.start_new_hour(self.clock.now());
                }
                Gate::BatchBreak(duration) => {
                    tracing::info!(secs = duration.as_secs(), "batch complete; taking a break");
                    if self.pause(duration, &mut state.cancel).await.is_err() {
                        return Some(LoopEnd::Cancelled);
                    }
                    state.limiter.batch_break_taken();
                }
            }
        }
    }

    /// Per-send jitter. Skipped once the daily cap is reached since no
    /// further attempt follows.
    async fn jitter(&self, state: &mut RunState) -> Option<LoopEnd> {
        if state.limiter.daily_cap_reached() {
            return None;
        }
        let delay = state.limiter.jitter(state.rotator.rng());
        tracing::debug!(delay_ms = delay.as_millis() as u64, "pacing delay");
        self.pause(delay, &mut state.cancel)
            .await
            .err()
            .map(|Cancelled| LoopEnd::Cancelled)
    }

    /// One delivery with bounded retry for transient failures. Each call is
    /// bounded by the policy's call timeout; an elapsed timeout counts as
    /// transient.
    async fn deliver(
        &self,
        session: &Session,
        message: OutgoingMessage,
        retry: &RetryPolicy,
        cancel: &mut CancelToken,
    ) -> Delivery {
        let mut attempt = SendAttempt::new(message);
        loop {
            let n = attempt.start_attempt();
            let call = self.client.send(session, &attempt.message);
            let result = match tokio::time::timeout(retry.call_timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(DeliveryFailure::transient(format!(
                    "send timed out after {}s",
                    retry.call_timeout.as_secs()
                ))),
            };

            match result {
                Ok(receipt) => return Delivery::Delivered(receipt),
                Err(failure) if failure.kind == FailureKind::Transient && retry.can_retry(n) => {
                    let delay = retry.next_delay(n);
                    tracing::warn!(
                        to = %attempt.message.to,
                        attempt = n,
                        delay_ms = delay.as_millis() as u64,
                        reason = %failure.reason,
                        "transient failure; retrying"
                    );
                    if self.pause(delay, cancel).await.is_err() {
                        return Delivery::Cancelled;
                    }
                }
                Err(failure) => return Delivery::Failed(failure),
            }
        }
    }

    async fn pause(&self, duration: Duration, cancel: &mut CancelToken) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            _ = self.clock.sleep(duration) => Ok(()),
            _ = cancel.cancelled() => Err(Cancelled),
        }
    }

    async fn pause_until(
        &self,
        deadline: NaiveDateTime,
        cancel: &mut CancelToken,
    ) -> Result<(), Cancelled> {
        if cancel.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            _ = self.clock.sleep_until(deadline) => Ok(()),
            _ = cancel.cancelled() => Err(Cancelled),
        }
    }
}

fn outside_window_message(next: Option<NextWindow>) -> String {
    match next {
        Some(next) => format!("outside send windows; next window {next}"),
        None => "outside send windows".to_string(),
    }
}
