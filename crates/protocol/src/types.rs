use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DEFAULT_METHOD;

/// Opaque identity assigned to a file when it is admitted to a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Generates a fresh random identity.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Lifecycle state of a file in the upload queue.
///
/// Transitions: `Queued -> Uploading -> {Uploaded | Failed | Canceled}`,
/// and any state except `Removed` may move to `Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Queued,
    Uploading,
    Uploaded,
    Failed,
    Canceled,
    Removed,
}

impl UploadStatus {
    /// Returns `true` for states with no outgoing transition other than `Removed`.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Uploaded | Self::Failed | Self::Canceled | Self::Removed
        )
    }

    /// Returns `true` while the file still counts against "all finished".
    pub fn is_unfinished(self) -> bool {
        matches!(self, Self::Queued | Self::Uploading)
    }

    /// Returns `true` if the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        match (self, next) {
            (Self::Removed, _) => false,
            (_, Self::Removed) => true,
            (Self::Queued, Self::Uploading) => true,
            (Self::Uploading, Self::Uploaded | Self::Failed | Self::Canceled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Removed => "removed",
        };
        f.pad(s)
    }
}

/// Where and how files from one registration are sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportConfig {
    pub endpoint: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub use_credentials: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_fields: BTreeMap<String, String>,
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

impl TransportConfig {
    /// Creates a config posting to `endpoint` with no extra headers or fields.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method: default_method(),
            use_credentials: false,
            headers: BTreeMap::new(),
            extra_fields: BTreeMap::new(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

/// Queue-wide scheduling options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueOptions {
    /// Maximum simultaneous uploads; `0` means unbounded.
    #[serde(default)]
    pub max_parallel_uploads: u32,
    /// Start queued files automatically as slots free up.
    #[serde(default)]
    pub auto_start: bool,
    /// Evict files from the queue once they reach a terminal state.
    #[serde(default)]
    pub auto_remove: bool,
}

/// Read-only view of one queued file, handed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSnapshot {
    pub id: FileId,
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub status: UploadStatus,
    pub progress: u8,
    pub bytes_sent: u64,
    pub response_code: u16,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_text: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub response_body: String,
    #[serde(default)]
    pub bytes_per_second: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta_secs: Option<f64>,
    pub admitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Aggregate counters over a list of snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSummary {
    pub total: usize,
    pub queued: usize,
    pub uploading: usize,
    pub uploaded: usize,
    pub failed: usize,
    pub canceled: usize,
    pub bytes_total: u64,
    pub bytes_sent: u64,
}

impl QueueSummary {
    /// Tallies a snapshot list. Removed files are not counted.
    pub fn from_files(files: &[FileSnapshot]) -> Self {
        let mut summary = Self::default();
        for file in files {
            match file.status {
                UploadStatus::Queued => summary.queued += 1,
                UploadStatus::Uploading => summary.uploading += 1,
                UploadStatus::Uploaded => summary.uploaded += 1,
                UploadStatus::Failed => summary.failed += 1,
                UploadStatus::Canceled => summary.canceled += 1,
                UploadStatus::Removed => continue,
            }
            summary.total += 1;
            summary.bytes_total += file.size;
            summary.bytes_sent += file.bytes_sent;
        }
        summary
    }

    /// Records a finished file that is no longer held by the queue.
    pub fn record(&mut self, file: &FileSnapshot) {
        self.add(std::slice::from_ref(file));
    }

    fn add(&mut self, files: &[FileSnapshot]) {
        let other = Self::from_files(files);
        self.total += other.total;
        self.queued += other.queued;
        self.uploading += other.uploading;
        self.uploaded += other.uploaded;
        self.failed += other.failed;
        self.canceled += other.canceled;
        self.bytes_total += other.bytes_total;
        self.bytes_sent += other.bytes_sent;
    }

    /// Returns `true` if every counted file uploaded successfully.
    pub fn all_succeeded(&self) -> bool {
        self.uploaded == self.total
    }
}
