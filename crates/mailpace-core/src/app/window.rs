//! Window gate: which workflow runs today, and whether the clock is inside
//! a send window right now.
//!
//! The two questions are answered independently: the weekday alone picks the
//! mode, the time of day alone picks the window.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::CampaignMode;

/// A daily clock-time interval, inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendWindow {
    pub label: String,
    #[serde(with = "clock_time")]
    pub start: NaiveTime,
    #[serde(with = "clock_time")]
    pub end: NaiveTime,
}

impl SendWindow {
    pub fn new(label: impl Into<String>, start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            label: label.into(),
            start,
            end,
        }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time <= self.end
    }
}

/// The next moment a window opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextWindow {
    pub date: NaiveDate,
    pub label: String,
    #[serde(with = "clock_time")]
    pub start: NaiveTime,
}

impl NextWindow {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start)
    }
}

impl fmt::Display for NextWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} at {} ({})",
            day_name(self.date.weekday()),
            self.date.format("%Y-%m-%d"),
            self.start.format("%H:%M"),
            self.label
        )
    }
}

/// Declarative day/time policy.
#[derive(Debug, Clone)]
pub struct WindowGate {
    new_days: Vec<Weekday>,
    followup_days: Vec<Weekday>,
    windows: Vec<SendWindow>,
}

impl WindowGate {
    pub fn new(
        new_days: impl IntoIterator<Item = Weekday>,
        followup_days: impl IntoIterator<Item = Weekday>,
        windows: Vec<SendWindow>,
    ) -> Self {
        Self {
            new_days: new_days.into_iter().collect(),
            followup_days: followup_days.into_iter().collect(),
            windows,
        }
    }

    pub fn windows(&self) -> &[SendWindow] {
        &self.windows
    }

    /// Mode for a weekday. New-recipient days win if a day is listed twice
    /// (config validation rejects that anyway).
    pub fn mode_for(&self, weekday: Weekday) -> CampaignMode {
        if self.new_days.contains(&weekday) {
            CampaignMode::New
        } else if self.followup_days.contains(&weekday) {
            CampaignMode::Followup
        } else {
            CampaignMode::None
        }
    }

    /// Pure function of the weekday of `now`.
    pub fn decide_mode(&self, now: NaiveDateTime) -> CampaignMode {
        self.mode_for(now.weekday())
    }

    /// First window (in configured order) containing the time of `now`.
    pub fn in_send_window(&self, now: NaiveDateTime) -> Option<&SendWindow> {
        let time = now.time();
        self.windows.iter().find(|w| w.contains(time))
    }

    /// Next window start strictly after `now`, scanning forward day by day
    /// over days that have a sending mode. Advisory only.
    pub fn next_window(&self, now: NaiveDateTime) -> Option<NextWindow> {
        let today = now.date();
        let time = now.time();

        if self.mode_for(today.weekday()).is_sending()
            && let Some(w) = self
                .windows
                .iter()
                .filter(|w| w.start > time)
                .min_by_key(|w| w.start)
        {
            return Some(NextWindow {
                date: today,
                label: w.label.clone(),
                start: w.start,
            });
        }

        let earliest = self.windows.iter().min_by_key(|w| w.start)?;
        (1..=7)
            .map(|offset| today + Duration::days(offset))
            .find(|date| self.mode_for(date.weekday()).is_sending())
            .map(|date| NextWindow {
                date,
                label: earliest.label.clone(),
                start: earliest.start,
            })
    }
}

pub fn day_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// `HH:MM` (or `HH:MM:SS`) serde format for clock times.
pub mod clock_time {
    use chrono::{NaiveTime, Timelike};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        let text = if time.second() == 0 {
            time.format("%H:%M").to_string()
        } else {
            time.format("%H:%M:%S").to_string()
        };
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveTime, String> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map_err(|e| format!("invalid clock time {raw:?}: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2024-03-11 is a Monday.
    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap().and_time(t(h, m))
    }

    fn gate() -> WindowGate {
        WindowGate::new(
            [Weekday::Mon, Weekday::Tue],
            [Weekday::Thu],
            vec![
                SendWindow::new("morning", t(9, 30), t(10, 30)),
                SendWindow::new("afternoon", t(14, 0), t(15, 0)),
            ],
        )
    }

    #[rstest]
    #[case::monday(11, CampaignMode::New)]
    #[case::tuesday(12, CampaignMode::New)]
    #[case::wednesday(13, CampaignMode::None)]
    #[case::thursday(14, CampaignMode::Followup)]
    #[case::sunday(17, CampaignMode::None)]
    fn mode_depends_on_weekday_only(#[case] day: u32, #[case] expected: CampaignMode) {
        let g = gate();
        assert_eq!(g.decide_mode(at(day, 0, 0)), expected);
        assert_eq!(g.decide_mode(at(day, 23, 59)), expected);
        // same weekday one week later
        assert_eq!(g.decide_mode(at(day, 12, 0) + Duration::days(7)), expected);
    }

    #[rstest]
    #[case::start_inclusive(9, 30, Some("morning"))]
    #[case::end_inclusive(10, 30, Some("morning"))]
    #[case::between(12, 0, None)]
    #[case::afternoon(14, 45, Some("afternoon"))]
    #[case::before(7, 0, None)]
    fn window_bounds_are_inclusive(#[case] h: u32, #[case] m: u32, #[case] label: Option<&str>) {
        let g = gate();
        let hit = g.in_send_window(at(11, h, m)).map(|w| w.label.as_str());
        assert_eq!(hit, label);
    }

    #[test]
    fn next_window_later_today() {
        let next = gate().next_window(at(11, 11, 0)).unwrap();
        assert_eq!(next.date, at(11, 0, 0).date());
        assert_eq!(next.label, "afternoon");
        assert_eq!(next.start, t(14, 0));
    }

    #[test]
    fn next_window_skips_to_next_sending_day() {
        // Tuesday evening -> Thursday morning (Wednesday is a rest day).
        let next = gate().next_window(at(12, 18, 0)).unwrap();
        assert_eq!(next.date, at(14, 0, 0).date());
        assert_eq!(next.label, "morning");
        assert_eq!(next.to_string(), "Thursday 2024-03-14 at 09:30 (morning)");
    }

    #[test]
    fn next_window_is_strictly_after_now() {
        let next = gate().next_window(at(11, 14, 0)).unwrap();
        assert_eq!(next.date, at(12, 0, 0).date());
        assert_eq!(next.start, t(9, 30));
    }

    #[test]
    fn next_window_none_without_windows_or_days() {
        let no_windows = WindowGate::new([Weekday::Mon], [], vec![]);
        assert!(no_windows.next_window(at(11, 8, 0)).is_none());

        let no_days = WindowGate::new([], [], gate().windows().to_vec());
        assert!(no_days.next_window(at(11, 8, 0)).is_none());
    }

    #[test]
    fn clock_time_accepts_minutes_and_seconds() {
        assert_eq!(clock_time::parse("09:05").unwrap(), t(9, 5));
        assert_eq!(clock_time::parse("09:05:00").unwrap(), t(9, 5));
        assert!(clock_time::parse("9am").is_err());
    }
}
