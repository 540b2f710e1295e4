//! Recipient model: one row of the recipient store plus its delivery state.
//!
//! Transitions are only possible through the `mark_*` methods so that the
//! store-level invariants hold for every row:
//! - `follow_up_status` becomes `Sent` only after `status == Sent` with a date.
//! - `date_sent` / `follow_up_date` are written once and never cleared.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Name used for personalization when a row has no name.
pub const DEFAULT_NAME: &str = "there";

/// Serialized date format of the store (`YYYY-MM-DD`).
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Delivery state of the initial message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Sent,
    Failed,
}

/// Delivery state of the follow-up message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowUpStatus {
    #[default]
    Pending,
    Sent,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl FollowUpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpStatus::Pending => "pending",
            FollowUpStatus::Sent => "sent",
        }
    }
}

/// Error for a status cell that is neither empty nor a known value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status value {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for DeliveryStatus {
    type Err = UnknownStatus;

    /// Empty cells take the default (`pending`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl FromStr for FollowUpStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "pending" => Ok(FollowUpStatus::Pending),
            "sent" => Ok(FollowUpStatus::Sent),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FollowUpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A date cell as found in the store.
///
/// Text that does not parse as `YYYY-MM-DD` is kept verbatim instead of
/// failing the whole load, so it round-trips untouched and the row is simply
/// treated as having no usable date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DateCell {
    Parsed(NaiveDate),
    Unparsed(String),
}

impl DateCell {
    /// Parse a raw cell. Empty text means "not set".
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        Some(match NaiveDate::parse_from_str(raw, DATE_FORMAT) {
            Ok(date) => DateCell::Parsed(date),
            Err(_) => DateCell::Unparsed(raw.to_string()),
        })
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            DateCell::Parsed(date) => Some(*date),
            DateCell::Unparsed(_) => None,
        }
    }
}

impl fmt::Display for DateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateCell::Parsed(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            DateCell::Unparsed(raw) => f.write_str(raw),
        }
    }
}

/// Why a recipient is not follow-up eligible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpBlock {
    InitialNotSent,
    AlreadyFollowedUp,
    NoDateSent,
    MalformedDateSent(String),
    TooRecent { days_elapsed: i64 },
}

/// One destination row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    email: String,
    pub name: Option<String>,
    status: DeliveryStatus,
    date_sent: Option<DateCell>,
    follow_up_status: FollowUpStatus,
    follow_up_date: Option<DateCell>,

    /// Columns the engine does not interpret; preserved on save.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Recipient {
    /// A fresh pending recipient.
    pub fn new(email: impl Into<String>, name: Option<String>) -> Self {
        Self {
            email: email.into(),
            name,
            status: DeliveryStatus::Pending,
            date_sent: None,
            follow_up_status: FollowUpStatus::Pending,
            follow_up_date: None,
            extra: BTreeMap::new(),
        }
    }

    /// Rebuild a recipient exactly as stored.
    ///
    /// Rows written by hand may violate the follow-up invariant; those keep
    /// their stored values (the engine never moves them further).
    pub fn from_stored(
        email: impl Into<String>,
        name: Option<String>,
        status: DeliveryStatus,
        date_sent: Option<DateCell>,
        follow_up_status: FollowUpStatus,
        follow_up_date: Option<DateCell>,
    ) -> Self {
        Self {
            email: email.into(),
            name,
            status,
            date_sent,
            follow_up_status,
            follow_up_date,
            extra: BTreeMap::new(),
        }
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn display_name(&self) -> &str {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => DEFAULT_NAME,
        }
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    pub fn date_sent(&self) -> Option<&DateCell> {
        self.date_sent.as_ref()
    }

    pub fn follow_up_status(&self) -> FollowUpStatus {
        self.follow_up_status
    }

    pub fn follow_up_date(&self) -> Option<&DateCell> {
        self.follow_up_date.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.status == DeliveryStatus::Pending
    }

    /// Minimal address sanity check done before calling the provider.
    pub fn has_plausible_address(&self) -> bool {
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
            None => false,
        }
    }

    /// Initial message delivered.
    pub fn mark_sent(&mut self, today: NaiveDate) {
        self.status = DeliveryStatus::Sent;
        if self.date_sent.is_none() {
            self.date_sent = Some(DateCell::Parsed(today));
        }
    }

    /// Initial message failed permanently.
    ///
    /// Only pending rows move to failed; a sent row stays sent.
    pub fn mark_failed(&mut self) {
        if self.status == DeliveryStatus::Pending {
            self.status = DeliveryStatus::Failed;
        }
    }

    /// Follow-up delivered. Returns `false` (and changes nothing) when the
    /// initial message was never recorded as sent.
    pub fn mark_followed_up(&mut self, today: NaiveDate) -> bool {
        if self.status != DeliveryStatus::Sent || self.date_sent.is_none() {
            return false;
        }
        self.follow_up_status = FollowUpStatus::Sent;
        if self.follow_up_date.is_none() {
            self.follow_up_date = Some(DateCell::Parsed(today));
        }
        true
    }

    /// Follow-up eligibility on `today` given the threshold in days.
    pub fn follow_up_eligibility(
        &self,
        today: NaiveDate,
        threshold_days: i64,
    ) -> Result<(), FollowUpBlock> {
        if self.status != DeliveryStatus::Sent {
            return Err(FollowUpBlock::InitialNotSent);
        }
        if self.follow_up_status != FollowUpStatus::Pending {
            return Err(FollowUpBlock::AlreadyFollowedUp);
        }
        let sent_on = match &self.date_sent {
            None => return Err(FollowUpBlock::NoDateSent),
            Some(DateCell::Unparsed(raw)) => {
                return Err(FollowUpBlock::MalformedDateSent(raw.clone()));
            }
            Some(DateCell::Parsed(date)) => *date,
        };
        let days_elapsed = (today - sent_on).num_days();
        if days_elapsed < threshold_days {
            return Err(FollowUpBlock::TooRecent { days_elapsed });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case::empty("", DeliveryStatus::Pending)]
    #[case::pending(" Pending ", DeliveryStatus::Pending)]
    #[case::sent("SENT", DeliveryStatus::Sent)]
    #[case::failed("failed", DeliveryStatus::Failed)]
    fn delivery_status_parses_loosely(#[case] raw: &str, #[case] expected: DeliveryStatus) {
        assert_eq!(raw.parse::<DeliveryStatus>().unwrap(), expected);
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!("bounced".parse::<DeliveryStatus>().is_err());
        assert!("failed".parse::<FollowUpStatus>().is_err());
    }

    #[test]
    fn malformed_date_is_kept_verbatim() {
        let cell = DateCell::parse("13/01/2024").unwrap();
        assert_eq!(cell, DateCell::Unparsed("13/01/2024".to_string()));
        assert_eq!(cell.as_date(), None);
        assert_eq!(cell.to_string(), "13/01/2024");

        assert_eq!(DateCell::parse("  "), None);
        assert_eq!(
            DateCell::parse("2024-01-13").unwrap().as_date(),
            Some(day(2024, 1, 13))
        );
    }

    #[test]
    fn display_name_falls_back_to_default() {
        assert_eq!(Recipient::new("a@x.io", None).display_name(), "there");
        assert_eq!(
            Recipient::new("a@x.io", Some("  ".into())).display_name(),
            "there"
        );
        assert_eq!(
            Recipient::new("a@x.io", Some("Ana".into())).display_name(),
            "Ana"
        );
    }

    #[test]
    fn follow_up_requires_initial_send() {
        let mut r = Recipient::new("a@x.io", None);
        assert!(!r.mark_followed_up(day(2024, 1, 10)));
        assert_eq!(r.follow_up_status(), FollowUpStatus::Pending);
        assert_eq!(r.follow_up_date(), None);
    }

    #[test]
    fn dates_are_never_rewritten() {
        let mut r = Recipient::new("a@x.io", None);
        r.mark_sent(day(2024, 1, 1));
        r.mark_sent(day(2024, 1, 5));
        assert_eq!(r.date_sent().and_then(DateCell::as_date), Some(day(2024, 1, 1)));

        assert!(r.mark_followed_up(day(2024, 1, 8)));
        assert!(r.mark_followed_up(day(2024, 1, 9)));
        assert_eq!(
            r.follow_up_date().and_then(DateCell::as_date),
            Some(day(2024, 1, 8))
        );
    }

    #[test]
    fn failed_never_overrides_sent() {
        let mut r = Recipient::new("a@x.io", None);
        r.mark_sent(day(2024, 1, 1));
        r.mark_failed();
        assert_eq!(r.status(), DeliveryStatus::Sent);
    }

    #[rstest]
    #[case::exactly_threshold(3, Ok(()))]
    #[case::one_day_short(2, Err(FollowUpBlock::TooRecent { days_elapsed: 2 }))]
    fn follow_up_threshold_is_inclusive(
        #[case] days_ago: i64,
        #[case] expected: Result<(), FollowUpBlock>,
    ) {
        let today = day(2024, 3, 10);
        let mut r = Recipient::new("a@x.io", None);
        r.mark_sent(today - chrono::Duration::days(days_ago));
        assert_eq!(r.follow_up_eligibility(today, 3), expected);
    }

    #[test]
    fn malformed_date_sent_blocks_follow_up() {
        let r = Recipient::from_stored(
            "a@x.io",
            None,
            DeliveryStatus::Sent,
            DateCell::parse("last week"),
            FollowUpStatus::Pending,
            None,
        );
        assert_eq!(
            r.follow_up_eligibility(day(2024, 3, 10), 3),
            Err(FollowUpBlock::MalformedDateSent("last week".into()))
        );
    }

    #[rstest]
    #[case("a@x.io", true)]
    #[case("", false)]
    #[case("no-at-sign", false)]
    #[case("@x.io", false)]
    fn address_sanity(#[case] email: &str, #[case] ok: bool) {
        assert_eq!(Recipient::new(email, None).has_plausible_address(), ok);
    }
}
