use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use uplift_protocol::{FileId, FileSnapshot, UploadStatus};

use crate::engine::TransferOutcome;
use crate::{FilePayload, RateEstimator};

/// Per-file transfer state.
///
/// Every mutator checks the lifecycle and returns `false` when the change
/// does not apply, so late or duplicate events are harmless.
#[derive(Debug)]
pub struct TransferRecord {
    id: FileId,
    payload: Arc<FilePayload>,
    status: UploadStatus,
    progress: u8,
    bytes_sent: u64,
    response_code: u16,
    response_text: String,
    response_body: String,
    rate: RateEstimator,
    admitted_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TransferRecord {
    /// Creates a queued record.
    pub fn new(id: FileId, payload: Arc<FilePayload>) -> Self {
        Self {
            id,
            payload,
            status: UploadStatus::Queued,
            progress: 0,
            bytes_sent: 0,
            response_code: 0,
            response_text: String::new(),
            response_body: String::new(),
            rate: RateEstimator::default(),
            admitted_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn payload(&self) -> &Arc<FilePayload> {
        &self.payload
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn response_code(&self) -> u16 {
        self.response_code
    }

    pub fn response_text(&self) -> &str {
        &self.response_text
    }

    /// Moves a queued record to `Uploading`.
    pub fn begin(&mut self) -> bool {
        self.transition(UploadStatus::Uploading)
    }

    /// Applies a transport progress report.
    ///
    /// Ignored unless uploading. `loaded` is clamped to the payload size and
    /// reports that would move `bytes_sent` backwards are dropped. Never
    /// changes the status; only [`complete`](Self::complete) does.
    pub fn apply_progress(&mut self, loaded: u64, total: u64) -> bool {
        if self.status != UploadStatus::Uploading {
            return false;
        }

        let loaded = loaded.min(self.payload.size);
        if loaded < self.bytes_sent {
            return false;
        }

        self.rate.add_sample(loaded - self.bytes_sent);
        self.bytes_sent = loaded;
        self.progress = if loaded == self.payload.size {
            100
        } else {
            percent(loaded, total.min(self.payload.size).max(loaded)).min(99)
        };
        true
    }

    /// Records the classified network outcome.
    pub fn complete(&mut self, outcome: &TransferOutcome) -> bool {
        let (next, response) = match outcome {
            TransferOutcome::Uploaded(response) => (UploadStatus::Uploaded, response),
            TransferOutcome::Failed(response) => (UploadStatus::Failed, response),
        };
        if !self.transition(next) {
            return false;
        }

        if next == UploadStatus::Uploaded {
            self.bytes_sent = self.payload.size;
            self.progress = 100;
        }
        self.response_code = response.code;
        self.response_text = response.text.clone();
        self.response_body = response.body.clone();
        true
    }

    /// Forces an uploading record to `Canceled`.
    pub fn mark_canceled(&mut self) -> bool {
        self.transition(UploadStatus::Canceled)
    }

    /// Marks the record as evicted. Irreversible.
    pub fn mark_removed(&mut self) -> bool {
        self.transition(UploadStatus::Removed)
    }

    pub fn snapshot(&self) -> FileSnapshot {
        let bytes_per_second = if self.status == UploadStatus::Uploading {
            self.rate.bytes_per_second()
        } else {
            0.0
        };
        let eta_secs = match self.status {
            UploadStatus::Uploading => self
                .rate
                .eta(self.payload.size - self.bytes_sent)
                .map(|d| d.as_secs_f64()),
            _ => None,
        };

        FileSnapshot {
            id: self.id,
            name: self.payload.name.clone(),
            path: self.payload.path.clone(),
            size: self.payload.size,
            status: self.status,
            progress: self.progress,
            bytes_sent: self.bytes_sent,
            response_code: self.response_code,
            response_text: self.response_text.clone(),
            response_body: self.response_body.clone(),
            bytes_per_second,
            eta_secs,
            admitted_at: self.admitted_at,
            finished_at: self.finished_at,
        }
    }

    fn transition(&mut self, next: UploadStatus) -> bool {
        if !self.status.can_transition_to(next) {
            debug!(file = %self.id, from = %self.status, to = %next, "transition ignored");
            return false;
        }

        debug!(file = %self.id, from = %self.status, to = %next, "status changed");
        self.status = next;
        if next.is_terminal() && self.finished_at.is_none() {
            self.finished_at = Some(Utc::now());
        }
        true
    }
}

/// Whole-number percentage of `loaded` over `total`.
fn percent(loaded: u64, total: u64) -> u8 {
    if total == 0 || loaded >= total {
        return 100;
    }
    let pct = (100.0 * loaded as f64 / total as f64).round() as u8;
    pct.min(99)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ResponseInfo;

    fn record(size: u64) -> TransferRecord {
        TransferRecord::new(
            FileId::new(),
            Arc::new(FilePayload::new("/tmp/a.bin", "a.bin", size)),
        )
    }

    fn response(code: u16, text: &str) -> ResponseInfo {
        ResponseInfo {
            code,
            text: text.into(),
            body: String::new(),
        }
    }

    #[test]
    fn new_record_is_queued() {
        let r = record(10);
        assert_eq!(r.status(), UploadStatus::Queued);
        assert_eq!(r.progress(), 0);
        assert_eq!(r.bytes_sent(), 0);
        assert_eq!(r.response_code(), 0);
        assert!(r.response_text().is_empty());
        assert!(r.snapshot().finished_at.is_none());
    }

    #[test]
    fn progress_requires_uploading() {
        let mut r = record(100);
        assert!(!r.apply_progress(10, 100));
        assert_eq!(r.bytes_sent(), 0);

        assert!(r.begin());
        assert!(r.apply_progress(10, 100));
        assert_eq!(r.bytes_sent(), 10);
        assert_eq!(r.progress(), 10);
    }

    #[test]
    fn progress_is_monotonic_and_clamped() {
        let mut r = record(100);
        r.begin();
        assert!(r.apply_progress(60, 100));
        assert!(!r.apply_progress(40, 100));
        assert_eq!(r.bytes_sent(), 60);

        assert!(r.apply_progress(500, 500));
        assert_eq!(r.bytes_sent(), 100);
        assert_eq!(r.progress(), 100);
        assert_eq!(r.status(), UploadStatus::Uploading);
    }

    #[test]
    fn near_complete_does_not_round_to_100() {
        let mut r = record(1000);
        r.begin();
        r.apply_progress(999, 1000);
        assert_eq!(r.progress(), 99);
        r.apply_progress(1000, 1000);
        assert_eq!(r.progress(), 100);
    }

    #[test]
    fn short_transport_total_does_not_read_complete() {
        let mut r = record(100);
        r.begin();
        assert!(r.apply_progress(50, 50));
        assert_eq!(r.bytes_sent(), 50);
        assert_eq!(r.progress(), 99);

        assert!(r.apply_progress(100, 100));
        assert_eq!(r.progress(), 100);
    }

    #[test]
    fn empty_file_reads_complete() {
        let mut r = record(0);
        r.begin();
        assert!(r.apply_progress(0, 0));
        assert_eq!(r.progress(), 100);
    }

    #[test]
    fn complete_uploaded_fills_response() {
        let mut r = record(1000);
        r.begin();
        r.apply_progress(1000, 1000);
        assert!(r.complete(&TransferOutcome::Uploaded(response(200, "OK"))));

        assert_eq!(r.status(), UploadStatus::Uploaded);
        assert_eq!(r.progress(), 100);
        assert_eq!(r.bytes_sent(), 1000);
        assert_eq!(r.response_code(), 200);
        assert_eq!(r.response_text(), "OK");
        assert!(r.snapshot().finished_at.is_some());
    }

    #[test]
    fn complete_requires_uploading() {
        let mut r = record(10);
        assert!(!r.complete(&TransferOutcome::Failed(response(0, "x"))));
        assert_eq!(r.status(), UploadStatus::Queued);
    }

    #[test]
    fn canceled_record_ignores_late_outcome() {
        let mut r = record(10);
        r.begin();
        assert!(r.mark_canceled());
        assert!(!r.mark_canceled());
        assert!(!r.complete(&TransferOutcome::Uploaded(response(200, "OK"))));
        assert!(!r.apply_progress(10, 10));
        assert_eq!(r.status(), UploadStatus::Canceled);
        assert_eq!(r.response_code(), 0);
    }

    #[test]
    fn removed_is_terminal() {
        let mut r = record(10);
        assert!(r.mark_removed());
        assert!(!r.mark_removed());
        assert!(!r.begin());
        assert_eq!(r.status(), UploadStatus::Removed);
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut r = record(50);
        r.begin();
        r.apply_progress(25, 50);
        let snap = r.snapshot();
        assert_eq!(snap.id, r.id());
        assert_eq!(snap.name, "a.bin");
        assert_eq!(snap.size, 50);
        assert_eq!(snap.status, UploadStatus::Uploading);
        assert_eq!(snap.progress, 50);
        assert_eq!(snap.bytes_sent, 25);
    }
}
