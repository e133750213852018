//! Queue state machine.
//!
//! [`QueueState`] owns the ordered collection and is the only writer of
//! record fields. Every admission, removal or status change ends in one
//! re-evaluation pass: auto-remove, then auto-start, then a "queue changed"
//! broadcast, then the "all finished" check.

use std::sync::Arc;

use tracing::{debug, info};

use uplift_protocol::{FileId, FileSnapshot, QueueOptions, TransportConfig, UploadStatus};
use uplift_transfer::{
    FilePayload, TransferEngine, TransferEvent, TransferHandle, TransferOutcome, TransferRecord,
};

use crate::observer::{Observers, QueueEvent, QueueObserver};

/// Starts the network side of an upload.
pub trait Dispatch: Send {
    fn begin(&mut self, record: &TransferRecord, transport: &TransportConfig) -> TransferHandle;
}

impl Dispatch for TransferEngine {
    fn begin(&mut self, record: &TransferRecord, transport: &TransportConfig) -> TransferHandle {
        self.begin_transfer(record, transport)
    }
}

/// A file about to be admitted.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub id: FileId,
    pub payload: Arc<FilePayload>,
    pub transport: Arc<TransportConfig>,
}

impl PendingFile {
    pub fn new(payload: Arc<FilePayload>, transport: Arc<TransportConfig>) -> Self {
        Self {
            id: FileId::new(),
            payload,
            transport,
        }
    }
}

struct Entry {
    record: TransferRecord,
    transport: Arc<TransportConfig>,
    transfer: Option<TransferHandle>,
}

pub struct QueueState {
    options: QueueOptions,
    entries: Vec<Entry>,
    observers: Observers,
    dispatcher: Box<dyn Dispatch>,
}

impl QueueState {
    pub fn new(options: QueueOptions, dispatcher: Box<dyn Dispatch>) -> Self {
        Self {
            options,
            entries: Vec::new(),
            observers: Observers::default(),
            dispatcher,
        }
    }

    pub fn subscribe(&mut self, observer: Arc<dyn QueueObserver>) {
        self.observers.push(observer);
    }

    pub fn options(&self) -> QueueOptions {
        self.options
    }

    pub fn set_options(&mut self, options: QueueOptions) {
        debug!(?options, "queue options changed");
        self.options = options;
        self.reevaluate();
    }

    /// Current collection in admission order.
    pub fn snapshot(&self) -> Vec<FileSnapshot> {
        self.entries.iter().map(|e| e.record.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Admits a batch as `Queued`, then runs one pass.
    pub fn admit(&mut self, files: Vec<PendingFile>) {
        let mut admitted = 0usize;
        for file in files {
            if self.position(file.id).is_some() {
                debug!(file = %file.id, "already admitted");
                continue;
            }

            let record = TransferRecord::new(file.id, file.payload);
            let snapshot = record.snapshot();
            self.entries.push(Entry {
                record,
                transport: file.transport,
                transfer: None,
            });
            self.emit(QueueEvent::FileAdded(snapshot));
            admitted += 1;
        }

        info!(count = admitted, queued = self.entries.len(), "files admitted");
        self.reevaluate();
    }

    /// Evicts a file, cancelling it first if it is uploading.
    pub fn remove(&mut self, id: FileId) {
        self.remove_file(id, false);
    }

    /// Evicts everything without per-file "removed" notifications.
    pub fn clear(&mut self) {
        for index in 0..self.entries.len() {
            self.cancel_at(index);
        }
        for entry in &mut self.entries {
            entry.record.mark_removed();
        }
        let count = self.entries.len();
        self.entries.clear();

        info!(count, "queue cleared");
        self.reevaluate();
    }

    /// Cancels an uploading file. No-op in any other state.
    pub fn cancel(&mut self, id: FileId) {
        let Some(index) = self.position(id) else {
            debug!(file = %id, "cancel for unknown file ignored");
            return;
        };
        if self.cancel_at(index) {
            self.reevaluate();
        }
    }

    /// Starts a queued file if a slot is free.
    pub fn start(&mut self, id: FileId) {
        let Some(index) = self.position(id) else {
            debug!(file = %id, "start for unknown file ignored");
            return;
        };
        if self.entries[index].record.status() != UploadStatus::Queued {
            debug!(file = %id, "start ignored, file is not queued");
            return;
        }
        if self.free_slots() == Some(0) {
            debug!(file = %id, "start deferred, no free upload slot");
            return;
        }

        self.start_at(index);
        self.reevaluate();
    }

    /// Applies an engine event to the file it belongs to.
    pub fn apply(&mut self, id: FileId, event: TransferEvent) {
        let Some(index) = self.position(id) else {
            debug!(file = %id, "event for unknown file ignored");
            return;
        };

        match event {
            TransferEvent::Progress { loaded, total } => {
                let record = &mut self.entries[index].record;
                if record.apply_progress(loaded, total) {
                    let snapshot = record.snapshot();
                    self.emit(QueueEvent::Progress(snapshot));
                }
            }
            TransferEvent::Completed(outcome) => {
                let entry = &mut self.entries[index];
                if !entry.record.complete(&outcome) {
                    debug!(file = %id, "late completion ignored");
                    return;
                }
                entry.transfer = None;
                let snapshot = entry.record.snapshot();

                match outcome {
                    TransferOutcome::Uploaded(_) => {
                        info!(file = %id, name = %snapshot.name, "upload finished");
                        self.emit(QueueEvent::Uploaded(snapshot.clone()));
                    }
                    TransferOutcome::Failed(ref r) => {
                        info!(file = %id, name = %snapshot.name, code = r.code, "upload failed");
                        self.emit(QueueEvent::Error(snapshot.clone()));
                    }
                }
                self.emit(QueueEvent::Finished(snapshot));
                self.reevaluate();
            }
        }
    }

    /// Aborts in-flight transfers without notifications. Used on shutdown.
    pub fn abort_all(&mut self) {
        for entry in &mut self.entries {
            if let Some(handle) = entry.transfer.take() {
                handle.abort();
            }
        }
    }

    fn position(&self, id: FileId) -> Option<usize> {
        self.entries.iter().position(|e| e.record.id() == id)
    }

    fn emit(&self, event: QueueEvent) {
        self.observers.emit(&event);
    }

    fn remove_file(&mut self, id: FileId, suppress_reevaluation: bool) {
        let Some(index) = self.position(id) else {
            debug!(file = %id, "remove for unknown file ignored");
            return;
        };

        self.cancel_at(index);
        let mut entry = self.entries.remove(index);
        entry.record.mark_removed();
        debug!(file = %id, "file removed");
        self.emit(QueueEvent::FileRemoved(entry.record.snapshot()));

        if !suppress_reevaluation {
            self.reevaluate();
        }
    }

    /// Cancels the entry at `index` if uploading; emits canceled + finished.
    fn cancel_at(&mut self, index: usize) -> bool {
        let entry = &mut self.entries[index];
        let Some(handle) = entry.transfer.as_ref() else {
            return false;
        };
        if !handle.cancel(&mut entry.record) {
            return false;
        }
        entry.transfer = None;

        let snapshot = entry.record.snapshot();
        info!(file = %snapshot.id, name = %snapshot.name, "upload canceled");
        self.emit(QueueEvent::Canceled(snapshot.clone()));
        self.emit(QueueEvent::Finished(snapshot));
        true
    }

    fn start_at(&mut self, index: usize) {
        if !self.entries[index].record.begin() {
            return;
        }
        let snapshot = self.entries[index].record.snapshot();
        debug!(file = %snapshot.id, name = %snapshot.name, "upload started");
        self.emit(QueueEvent::UploadStarted(snapshot));

        let entry = &self.entries[index];
        let handle = self.dispatcher.begin(&entry.record, &entry.transport);
        self.entries[index].transfer = Some(handle);
    }

    /// Remaining upload slots, or `None` when unbounded.
    fn free_slots(&self) -> Option<usize> {
        if self.options.max_parallel_uploads == 0 {
            return None;
        }
        let active = self
            .entries
            .iter()
            .filter(|e| e.record.status() == UploadStatus::Uploading)
            .count();
        Some((self.options.max_parallel_uploads as usize).saturating_sub(active))
    }

    /// Queued files allowed to start now, oldest first.
    fn waiting_files(&self) -> Vec<FileId> {
        if !self.options.auto_start {
            return Vec::new();
        }
        let queued = self
            .entries
            .iter()
            .filter(|e| e.record.status() == UploadStatus::Queued)
            .map(|e| e.record.id());
        match self.free_slots() {
            Some(slots) => queued.take(slots).collect(),
            None => queued.collect(),
        }
    }

    fn reevaluate(&mut self) {
        if self.options.auto_remove {
            let finished: Vec<FileId> = self
                .entries
                .iter()
                .filter(|e| {
                    matches!(
                        e.record.status(),
                        UploadStatus::Uploaded | UploadStatus::Failed | UploadStatus::Canceled
                    )
                })
                .map(|e| e.record.id())
                .collect();
            for id in finished {
                self.remove_file(id, true);
            }
        }

        for id in self.waiting_files() {
            if let Some(index) = self.position(id) {
                self.start_at(index);
            }
        }

        self.emit(QueueEvent::QueueChanged(self.snapshot()));

        if !self
            .entries
            .iter()
            .any(|e| e.record.status().is_unfinished())
        {
            debug!("all files finished");
            self.emit(QueueEvent::AllFinished);
        }
    }
}
