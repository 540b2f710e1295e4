//! Clock port - wall-clock time and suspension.
//!
//! Every wait in a campaign run goes through this trait so tests can run
//! hour-long pauses instantly against a manual clock.
//!
//! # 学習ポイント
//! - `sleep_until` は trait の default method (実装側は `now` と `sleep` だけ書けばよい)

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;

/// Provides local wall-clock time and the ability to wait.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current local time.
    fn now(&self) -> NaiveDateTime;

    /// Suspend for `duration`.
    async fn sleep(&self, duration: Duration);

    /// Suspend until `deadline`; returns immediately if it has passed.
    async fn sleep_until(&self, deadline: NaiveDateTime) {
        let remaining = (deadline - self.now()).to_std().unwrap_or(Duration::ZERO);
        if !remaining.is_zero() {
            self.sleep(remaining).await;
        }
    }
}
