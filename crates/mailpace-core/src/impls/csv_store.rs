//! CsvRecipientStore - the recipient list as a CSV file.
//!
//! # Format
//! - Header names are normalized on load: trimmed, lower-cased, and runs of
//!   separators collapsed to `_` (`"Date Sent"` -> `date_sent`).
//! - Only `email` is required; missing optional columns take their defaults.
//! - Dates are `YYYY-MM-DD`.
//! - Unknown columns are carried through unchanged.
//!
//! Writes go to a sibling temp file that is renamed over the original, so a
//! crash mid-write never leaves a truncated store behind.
//!
//! # 設計
//! - 未知の列は Recipient 側の map に保持し、保存時に同じ列名で書き戻す

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{DateCell, DeliveryStatus, FollowUpStatus, Recipient};
use crate::error::StoreError;
use crate::ports::RecipientStore;

const EMAIL: &str = "email";
const NAME: &str = "name";
const STATUS: &str = "status";
const DATE_SENT: &str = "date_sent";
const FOLLOW_UP_STATUS: &str = "follow_up_status";
const FOLLOW_UP_DATE: &str = "follow_up_date";

const KNOWN_COLUMNS: [&str; 6] = [
    EMAIL,
    NAME,
    STATUS,
    DATE_SENT,
    FOLLOW_UP_STATUS,
    FOLLOW_UP_DATE,
];

#[derive(Debug, Clone)]
pub struct CsvRecipientStore {
    path: PathBuf,
}

impl CsvRecipientStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

#[async_trait]
impl RecipientStore for CsvRecipientStore {
    async fn load(&self) -> Result<Vec<Recipient>, StoreError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_rows(&path))
            .await
            .map_err(|e| StoreError::Other(format!("load task failed: {e}")))?
    }

    async fn save(&self, recipients: &[Recipient]) -> Result<(), StoreError> {
        let path = self.path.clone();
        let rows = recipients.to_vec();
        tokio::task::spawn_blocking(move || write_rows(&path, &rows))
            .await
            .map_err(|e| StoreError::Other(format!("save task failed: {e}")))?
    }
}

/// `" Follow-Up  Date "` -> `"follow_up_date"`.
pub fn normalize_header(raw: &str) -> String {
    let lowered = raw.trim_start_matches('\u{feff}').trim().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_sep = false;
    for c in lowered.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

fn read_rows(path: &Path) -> Result<Vec<Recipient>, StoreError> {
    if !path.is_file() {
        return Err(StoreError::NotFound(path.to_path_buf()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(normalize_header).collect();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (i, h) in headers.iter().enumerate() {
        index.entry(h.as_str()).or_insert(i);
    }
    if !index.contains_key(EMAIL) {
        return Err(StoreError::MissingEmailColumn);
    }

    let mut recipients = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // 1-based, counting the header line
        let row = i + 2;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let cell = |name: &str| cell_at(&index, &record, name).to_string();

        let email = cell(EMAIL);
        let name = Some(cell(NAME)).filter(|n| !n.is_empty());
        let status: DeliveryStatus = cell(STATUS).parse().map_err(|e| StoreError::Malformed {
            row,
            reason: format!("status: {e}"),
        })?;
        let follow_up_status: FollowUpStatus =
            cell(FOLLOW_UP_STATUS)
                .parse()
                .map_err(|e| StoreError::Malformed {
                    row,
                    reason: format!("follow_up_status: {e}"),
                })?;

        if !email.is_empty()
            && let Some(first) = seen.insert(email.to_lowercase(), row)
        {
            return Err(StoreError::DuplicateEmail {
                email,
                first,
                second: row,
            });
        }

        let mut recipient = Recipient::from_stored(
            email,
            name,
            status,
            DateCell::parse(&cell(DATE_SENT)),
            follow_up_status,
            DateCell::parse(&cell(FOLLOW_UP_DATE)),
        );
        for (idx, header) in headers.iter().enumerate() {
            if header.is_empty()
                || KNOWN_COLUMNS.contains(&header.as_str())
                || index.get(header.as_str()) != Some(&idx)
            {
                continue;
            }
            recipient
                .extra
                .insert(header.clone(), record.get(idx).unwrap_or("").to_string());
        }
        recipients.push(recipient);
    }

    tracing::debug!(path = %path.display(), rows = recipients.len(), "loaded recipient store");
    Ok(recipients)
}

fn cell_at<'r>(index: &HashMap<&str, usize>, record: &'r csv::StringRecord, name: &str) -> &'r str {
    index
        .get(name)
        .and_then(|&idx| record.get(idx))
        .unwrap_or("")
}

fn write_rows(path: &Path, recipients: &[Recipient]) -> Result<(), StoreError> {
    let extra_columns: BTreeSet<&str> = recipients
        .iter()
        .flat_map(|r| r.extra.keys().map(String::as_str))
        .collect();

    let tmp = temp_path(path);
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        let mut header: Vec<&str> = KNOWN_COLUMNS.to_vec();
        header.extend(extra_columns.iter().copied());
        writer.write_record(&header)?;

        for r in recipients {
            let mut record = vec![
                r.email().to_string(),
                r.name.clone().unwrap_or_default(),
                r.status().to_string(),
                r.date_sent().map(ToString::to_string).unwrap_or_default(),
                r.follow_up_status().to_string(),
                r.follow_up_date().map(ToString::to_string).unwrap_or_default(),
            ];
            for col in &extra_columns {
                record.push(r.extra.get(*col).cloned().unwrap_or_default());
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;

    tracing::debug!(path = %path.display(), rows = recipients.len(), "saved recipient store");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "recipients.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Starter file with the columns operators usually fill in by hand.
pub fn write_sample(path: &Path) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([EMAIL, NAME, STATUS])?;
    writer.write_record(["example1@email.com", "John Doe", "pending"])?;
    writer.write_record(["example2@email.com", "Jane Smith", "pending"])?;
    writer.flush()?;
    Ok(())
}
