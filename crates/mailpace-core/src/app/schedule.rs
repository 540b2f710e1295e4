//! DailySchedule - 毎日決まった時刻に campaign run を起動する
//!
//! # 設計
//! - 時刻計算は `Clock` 経由 (テストでは ManualClock で一日を即座に進める)
//! - shutdown は watch channel で通知し、`select!` で sleep と競合させる
//! - tick 実行中は shutdown を待たせる (run の途中で打ち切らない)

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ports::Clock;

/// Daily trigger handle.
/// - `request_shutdown()` stops the loop before its next wait
/// - `shutdown_and_join()` also waits for a tick in progress to finish
pub struct DailySchedule {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl DailySchedule {
    /// Call `tick` every day at `run_at` (local time), and once right away
    /// when `run_on_start` is set.
    pub fn spawn<F, Fut>(
        clock: Arc<dyn Clock>,
        run_at: NaiveTime,
        run_on_start: bool,
        tick: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(async move {
            schedule_loop(clock, run_at, run_on_start, tick, &mut shutdown_rx).await;
        });
        Self { shutdown_tx, join }
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

/// First `at` strictly after `now`.
pub fn next_occurrence(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

async fn schedule_loop<F, Fut>(
    clock: Arc<dyn Clock>,
    run_at: NaiveTime,
    run_on_start: bool,
    mut tick: F,
    shutdown_rx: &mut watch::Receiver<bool>,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    if run_on_start && !*shutdown_rx.borrow() {
        tick().await;
    }

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let next = next_occurrence(clock.now(), run_at);
        tracing::info!(next = %next, "next scheduled run");

        // the wait races the shutdown signal; a tick itself is never interrupted
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = clock.sleep_until(next) => {}
        }

        tick().await;
    }
    tracing::info!("daily schedule stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::ManualClock;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 11)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn next_occurrence_is_strictly_after_now() {
        assert_eq!(next_occurrence(at(9, 0), hm(10, 1)), at(10, 1));
        assert_eq!(
            next_occurrence(at(10, 1), hm(10, 1)),
            at(10, 1) + Duration::days(1)
        );
        assert_eq!(
            next_occurrence(at(23, 0), hm(10, 1)),
            at(10, 1) + Duration::days(1)
        );
    }

    #[tokio::test]
    async fn ticks_at_the_configured_time_each_day() {
        let clock = ManualClock::new(at(10, 0));
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&ticks);

        let schedule = DailySchedule::spawn(Arc::new(clock.clone()), hm(10, 1), false, move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while ticks.load(Ordering::SeqCst) < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        schedule.shutdown_and_join().await;

        let sleeps = clock.sleeps();
        assert_eq!(sleeps[0], std::time::Duration::from_secs(60));
        assert_eq!(sleeps[1], std::time::Duration::from_secs(24 * 3600));
    }

    #[tokio::test]
    async fn runs_once_on_start_when_asked() {
        let clock = ManualClock::new(at(10, 0));
        let first_tick_sleeps = Arc::new(std::sync::Mutex::new(None));
        let seen = Arc::clone(&first_tick_sleeps);
        let observed = clock.clone();

        let schedule = DailySchedule::spawn(Arc::new(clock.clone()), hm(10, 1), true, move || {
            let seen = Arc::clone(&seen);
            let sleeps = observed.sleeps().len();
            async move {
                seen.lock().unwrap().get_or_insert(sleeps);
            }
        });

        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while first_tick_sleeps.lock().unwrap().is_none() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        schedule.shutdown_and_join().await;

        // the first tick came before any wait
        assert_eq!(*first_tick_sleeps.lock().unwrap(), Some(0));
    }
}
