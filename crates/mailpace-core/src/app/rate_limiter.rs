//! Rate limiter: decides, before every send attempt, whether the run may
//! proceed now, must pause, or is done for the day.
//!
//! The check order is daily cap -> hourly cap -> batch break. The per-send
//! jitter is drawn separately after each successful send.
//!
//! # 設計
//! - 判定 (`check`) と副作用 (`record_send` / `start_new_hour`) を分離
//! - 現在時刻は引数で受け取る (純粋関数としてテスト可能)

use std::time::Duration;

use chrono::NaiveDateTime;
use rand::Rng;

/// Numeric limits of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimits {
    pub daily_cap: u32,
    pub hourly_cap: u32,
    pub batch_size: u32,
    pub batch_break: Duration,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

/// Which of the optional rules a loop is subject to. The daily cap and the
/// per-send jitter always apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingRules {
    pub hourly_cap: bool,
    pub batch_breaks: bool,
}

impl PacingRules {
    pub fn full() -> Self {
        Self {
            hourly_cap: true,
            batch_breaks: true,
        }
    }
}

/// Verdict of a pre-send check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Daily cap reached: end the loop normally.
    Stop,
    /// Hourly cap reached: wait for the hour window to end.
    WaitUntil(NaiveDateTime),
    /// Batch complete: take the break, then check again.
    BatchBreak(Duration),
    Proceed,
}

/// Per-run pacing state.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limits: RateLimits,
    total_sent: u32,
    hourly_sent: u32,
    hour_window_start: NaiveDateTime,
    /// Sends since the last batch break.
    batch_position: u32,
}

impl RateLimiter {
    pub fn new(limits: RateLimits, now: NaiveDateTime) -> Self {
        Self {
            limits,
            total_sent: 0,
            hourly_sent: 0,
            hour_window_start: now,
            batch_position: 0,
        }
    }

    pub fn total_sent(&self) -> u32 {
        self.total_sent
    }

    pub fn daily_cap_reached(&self) -> bool {
        self.total_sent >= self.limits.daily_cap
    }

    /// Pre-send check.
    pub fn check(&mut self, now: NaiveDateTime, rules: PacingRules) -> Gate {
        if self.daily_cap_reached() {
            return Gate::Stop;
        }

        if rules.hourly_cap {
            let window_end = self.hour_window_start + chrono::Duration::hours(1);
            if now >= window_end {
                self.start_new_hour(now);
            } else if self.hourly_sent >= self.limits.hourly_cap {
                return Gate::WaitUntil(window_end);
            }
        }

        if rules.batch_breaks && self.batch_position >= self.limits.batch_size {
            return Gate::BatchBreak(self.limits.batch_break);
        }

        Gate::Proceed
    }

    /// Called after waiting out the hourly cap.
    pub fn start_new_hour(&mut self, now: NaiveDateTime) {
        self.hourly_sent = 0;
        self.hour_window_start = now;
    }

    /// Called after a batch break has been taken.
    pub fn batch_break_taken(&mut self) {
        self.batch_position = 0;
    }

    pub fn record_send(&mut self) {
        self.total_sent += 1;
        self.hourly_sent += 1;
        self.batch_position += 1;
    }

    /// Uniform draw from `[min_delay, max_delay]`.
    pub fn jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.limits.min_delay.as_millis() as u64;
        let max = self.limits.max_delay.as_millis() as u64;
        if max <= min {
            return self.limits.min_delay;
        }
        Duration::from_millis(rng.gen_range(min..=max))
    }
}
