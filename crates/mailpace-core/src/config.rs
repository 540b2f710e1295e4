//! Campaign configuration, loaded from a TOML file.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Day/time gating stays declarative here: changing which weekdays send or
//! which clock windows are open never requires a code change.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::app::rate_limiter::{PacingRules, RateLimits};
use crate::app::retry::RetryPolicy;
use crate::app::window::{SendWindow, WindowGate};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignConfig {
    /// Seeds template rotation and jitter; `None` draws from OS entropy.
    pub rng_seed: Option<u64>,
    pub paths: PathsConfig,
    pub schedule: ScheduleConfig,
    pub limits: LimitsConfig,
    pub followup: FollowupConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub store: PathBuf,
    pub templates: PathBuf,
    pub attachment: Option<PathBuf>,
    pub credentials: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            store: PathBuf::from("emails.csv"),
            templates: PathBuf::from("templates.toml"),
            attachment: Some(PathBuf::from("attachment.pdf")),
            credentials: PathBuf::from("token.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub new_days: Vec<Weekday>,
    pub followup_days: Vec<Weekday>,
    pub windows: Vec<SendWindow>,
    /// Time of day the daemon triggers its daily run.
    #[serde(with = "crate::app::window::clock_time")]
    pub daily_run_at: NaiveTime,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            new_days: vec![Weekday::Mon, Weekday::Tue, Weekday::Wed],
            followup_days: vec![Weekday::Thu, Weekday::Fri],
            windows: vec![
                SendWindow::new("morning", hm(9, 30), hm(10, 30)),
                SendWindow::new("afternoon", hm(14, 0), hm(15, 30)),
            ],
            daily_run_at: hm(10, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub daily_cap: u32,
    pub hourly_cap: u32,
    pub batch_size: u32,
    pub batch_break_secs: u64,
    pub min_delay_secs: u64,
    pub max_delay_secs: u64,
    /// Apply the hourly cap to follow-up sending too.
    pub followup_hourly_cap: bool,
    /// Apply batch breaks to follow-up sending too.
    pub followup_batch_breaks: bool,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            daily_cap: 450,
            hourly_cap: 40,
            batch_size: 20,
            batch_break_secs: 300,
            min_delay_secs: 30,
            max_delay_secs: 90,
            followup_hourly_cap: false,
            followup_batch_breaks: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowupConfig {
    pub threshold_days: i64,
}

impl Default for FollowupConfig {
    fn default() -> Self {
        Self { threshold_days: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_secs: u64,
    pub multiplier: f64,
    pub call_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2,
            multiplier: 2.0,
            call_timeout_secs: 30,
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl CampaignConfig {
    /// Read, parse and validate a config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content)?;
        tracing::debug!(path = %path.display(), "loaded campaign config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.schedule;
        if let Some(day) = s.new_days.iter().find(|d| s.followup_days.contains(d)) {
            return Err(ConfigError::Invalid(format!(
                "{day} is both a new-recipient day and a follow-up day"
            )));
        }
        for w in &s.windows {
            if w.start > w.end {
                return Err(ConfigError::Invalid(format!(
                    "window {:?} starts after it ends",
                    w.label
                )));
            }
        }

        let l = &self.limits;
        if l.daily_cap == 0 || l.hourly_cap == 0 || l.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "daily_cap, hourly_cap and batch_size must be at least 1".into(),
            ));
        }
        if l.min_delay_secs > l.max_delay_secs {
            return Err(ConfigError::Invalid(
                "min_delay_secs must not exceed max_delay_secs".into(),
            ));
        }

        let r = &self.retry;
        if r.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if r.multiplier.is_nan() || r.multiplier < 1.0 {
            return Err(ConfigError::Invalid("retry.multiplier must be >= 1.0".into()));
        }
        if self.followup.threshold_days < 0 {
            return Err(ConfigError::Invalid("followup.threshold_days must be >= 0".into()));
        }
        Ok(())
    }

    pub fn window_gate(&self) -> WindowGate {
        WindowGate::new(
            self.schedule.new_days.iter().copied(),
            self.schedule.followup_days.iter().copied(),
            self.schedule.windows.clone(),
        )
    }

    pub fn rate_limits(&self) -> RateLimits {
        let l = &self.limits;
        RateLimits {
            daily_cap: l.daily_cap,
            hourly_cap: l.hourly_cap,
            batch_size: l.batch_size,
            batch_break: Duration::from_secs(l.batch_break_secs),
            min_delay: Duration::from_secs(l.min_delay_secs),
            max_delay: Duration::from_secs(l.max_delay_secs),
        }
    }

    /// Pacing rules for the follow-up loop (the new-recipient loop always
    /// gets the full set).
    pub fn followup_pacing(&self) -> PacingRules {
        PacingRules {
            hourly_cap: self.limits.followup_hourly_cap,
            batch_breaks: self.limits.followup_batch_breaks,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let r = &self.retry;
        RetryPolicy {
            max_attempts: r.max_attempts,
            base_delay: Duration::from_secs(r.base_delay_secs),
            multiplier: r.multiplier,
            call_timeout: Duration::from_secs(r.call_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = CampaignConfig::parse("").unwrap();
        assert_eq!(config, CampaignConfig::default());
        assert_eq!(config.limits.daily_cap, 450);
        assert_eq!(config.schedule.windows.len(), 2);
    }

    #[test]
    fn parses_full_file() {
        let config = CampaignConfig::parse(
            r#"
            rng_seed = 7

            [paths]
            store = "list.csv"

            [schedule]
            new_days = ["Mon", "tuesday"]
            followup_days = ["Fri"]
            daily_run_at = "08:15"
            windows = [
              { label = "early", start = "08:00", end = "09:00" },
              { label = "late", start = "16:00:00", end = "17:30" },
            ]

            [limits]
            daily_cap = 10
            followup_hourly_cap = true

            [followup]
            threshold_days = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.rng_seed, Some(7));
        assert_eq!(config.paths.store, PathBuf::from("list.csv"));
        assert_eq!(config.schedule.new_days, vec![Weekday::Mon, Weekday::Tue]);
        assert_eq!(config.schedule.daily_run_at, hm(8, 15));
        assert_eq!(config.schedule.windows[1].start, hm(16, 0));
        assert_eq!(config.limits.daily_cap, 10);
        assert_eq!(config.limits.hourly_cap, 40);
        assert!(config.followup_pacing().hourly_cap);
        assert!(!config.followup_pacing().batch_breaks);
        assert_eq!(config.followup.threshold_days, 5);
    }

    #[test]
    fn overlapping_days_are_rejected() {
        let err = CampaignConfig::parse(
            r#"
            [schedule]
            new_days = ["Mon"]
            followup_days = ["Mon"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn inverted_delays_are_rejected() {
        let err = CampaignConfig::parse(
            r#"
            [limits]
            min_delay_secs = 10
            max_delay_secs = 5
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("min_delay_secs"));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = CampaignConfig::parse(
            r#"
            [schedule]
            windows = [{ label = "bad", start = "11:00", end = "10:00" }]
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn load_from_missing_file_is_io_error() {
        let err = CampaignConfig::load_from(Path::new("/nonexistent/mailpace.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
