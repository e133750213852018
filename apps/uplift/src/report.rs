//! Observers used by the CLI: lifecycle logging and the final report.

use std::fmt;
use std::sync::Mutex;

use serde::Serialize;
use tracing::{debug, info, warn};

use uplift_protocol::{FileSnapshot, QueueSummary, UploadStatus};
use uplift_queue::QueueObserver;

/// Logs every lifecycle notification through `tracing`.
pub struct LoggingObserver;

impl QueueObserver for LoggingObserver {
    fn on_file_added(&self, file: &FileSnapshot) {
        debug!(file = %file.id, name = %file.name, size = file.size, "queued");
    }

    fn on_upload_started(&self, file: &FileSnapshot) {
        info!(name = %file.name, size = file.size, "uploading");
    }

    fn on_progress(&self, file: &FileSnapshot) {
        debug!(
            name = %file.name,
            progress = file.progress,
            bytes_sent = file.bytes_sent,
            rate = file.bytes_per_second,
            "progress"
        );
    }

    fn on_uploaded(&self, file: &FileSnapshot) {
        info!(name = %file.name, code = file.response_code, "uploaded");
    }

    fn on_error(&self, file: &FileSnapshot) {
        warn!(
            name = %file.name,
            code = file.response_code,
            reason = %file.response_text,
            "upload failed"
        );
    }

    fn on_canceled(&self, file: &FileSnapshot) {
        warn!(name = %file.name, "upload canceled");
    }

    fn on_file_removed(&self, file: &FileSnapshot) {
        debug!(file = %file.id, name = %file.name, "removed from queue");
    }

    fn on_all_finished(&self) {
        debug!("queue drained");
    }
}

/// Outcome of a run, built from "finished" notifications so it survives
/// auto-removal. Files that were admitted but never finished (evicted by an
/// interrupt before they started) are listed as skipped and counted as queued.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub summary: QueueSummary,
    pub files: Vec<FileSnapshot>,
}

impl Report {
    pub fn succeeded(&self) -> bool {
        self.summary.total > 0 && self.summary.all_succeeded()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for file in &self.files {
            match file.status {
                UploadStatus::Uploaded => {
                    writeln!(f, "  ok       {} ({} bytes)", file.name, file.size)?
                }
                UploadStatus::Failed => writeln!(
                    f,
                    "  failed   {} ({} {})",
                    file.name, file.response_code, file.response_text
                )?,
                UploadStatus::Queued => writeln!(f, "  skipped  {}", file.name)?,
                status => writeln!(f, "  {status:<8} {}", file.name)?,
            }
        }
        let s = &self.summary;
        write!(
            f,
            "{} uploaded, {} failed, {} canceled",
            s.uploaded, s.failed, s.canceled
        )?;
        if s.queued > 0 {
            write!(f, ", {} skipped", s.queued)?;
        }
        write!(f, " ({} of {} bytes sent)", s.bytes_sent, s.bytes_total)
    }
}

#[derive(Default)]
struct Collected {
    admitted: Vec<FileSnapshot>,
    finished: Vec<FileSnapshot>,
}

/// Collects admitted and finished files into a [`Report`].
#[derive(Default)]
pub struct ReportObserver {
    collected: Mutex<Collected>,
}

impl ReportObserver {
    pub fn report(&self) -> Report {
        let Ok(collected) = self.collected.lock() else {
            return Report::default();
        };

        let mut report = Report::default();
        for file in &collected.finished {
            report.summary.record(file);
            report.files.push(file.clone());
        }
        // Cleared before starting: no "finished" ever arrives for these.
        for file in &collected.admitted {
            if !collected.finished.iter().any(|f| f.id == file.id) {
                report.summary.record(file);
                report.files.push(file.clone());
            }
        }
        report
    }
}

impl QueueObserver for ReportObserver {
    fn on_file_added(&self, file: &FileSnapshot) {
        if let Ok(mut collected) = self.collected.lock() {
            collected.admitted.push(file.clone());
        }
    }

    fn on_finished(&self, file: &FileSnapshot) {
        if let Ok(mut collected) = self.collected.lock() {
            collected.finished.push(file.clone());
        }
    }
}
