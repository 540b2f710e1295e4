//! Send attempt: the ephemeral unit handed to the delivery client.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A file attached to a follow-up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub path: PathBuf,
}

impl Attachment {
    /// `Some` only if a file exists at `path`.
    pub fn if_exists(path: &Path) -> Option<Self> {
        path.is_file().then(|| Self {
            path: path.to_path_buf(),
        })
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Fully rendered message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// One delivery plus its retries. Never persisted.
#[derive(Debug, Clone)]
pub struct SendAttempt {
    pub message: OutgoingMessage,

    /// Calls made so far (1-indexed once the first call starts).
    pub attempts: u32,
}

impl SendAttempt {
    pub fn new(message: OutgoingMessage) -> Self {
        Self {
            message,
            attempts: 0,
        }
    }

    pub fn start_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }
}
