//! Observer boundary.
//!
//! Observers are invoked from the queue task, in registration order, once
//! per event. Every method defaults to a no-op.

use std::sync::Arc;

use tokio::sync::mpsc;

use uplift_protocol::FileSnapshot;

/// A notification raised by the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    FileAdded(FileSnapshot),
    FileRemoved(FileSnapshot),
    Progress(FileSnapshot),
    UploadStarted(FileSnapshot),
    Uploaded(FileSnapshot),
    Error(FileSnapshot),
    Canceled(FileSnapshot),
    /// Follows `Uploaded`, `Error` or `Canceled`, once per file.
    Finished(FileSnapshot),
    /// Current collection, once per re-evaluation pass.
    QueueChanged(Vec<FileSnapshot>),
    /// No queued or uploading file remains.
    AllFinished,
}

/// Receives queue notifications.
pub trait QueueObserver: Send + Sync {
    fn on_file_added(&self, _file: &FileSnapshot) {}
    fn on_file_removed(&self, _file: &FileSnapshot) {}
    fn on_progress(&self, _file: &FileSnapshot) {}
    fn on_upload_started(&self, _file: &FileSnapshot) {}
    fn on_uploaded(&self, _file: &FileSnapshot) {}
    fn on_error(&self, _file: &FileSnapshot) {}
    fn on_canceled(&self, _file: &FileSnapshot) {}
    fn on_finished(&self, _file: &FileSnapshot) {}
    fn on_queue_changed(&self, _files: &[FileSnapshot]) {}
    fn on_all_finished(&self) {}

    /// Entry point used by the queue; routes to the specific methods.
    fn on_event(&self, event: &QueueEvent) {
        match event {
            QueueEvent::FileAdded(f) => self.on_file_added(f),
            QueueEvent::FileRemoved(f) => self.on_file_removed(f),
            QueueEvent::Progress(f) => self.on_progress(f),
            QueueEvent::UploadStarted(f) => self.on_upload_started(f),
            QueueEvent::Uploaded(f) => self.on_uploaded(f),
            QueueEvent::Error(f) => self.on_error(f),
            QueueEvent::Canceled(f) => self.on_canceled(f),
            QueueEvent::Finished(f) => self.on_finished(f),
            QueueEvent::QueueChanged(files) => self.on_queue_changed(files),
            QueueEvent::AllFinished => self.on_all_finished(),
        }
    }
}

/// Ordered observer list.
#[derive(Default)]
pub(crate) struct Observers(Vec<Arc<dyn QueueObserver>>);

impl Observers {
    pub(crate) fn push(&mut self, observer: Arc<dyn QueueObserver>) {
        self.0.push(observer);
    }

    pub(crate) fn emit(&self, event: &QueueEvent) {
        for observer in &self.0 {
            observer.on_event(event);
        }
    }
}

/// Forwards every event to an unbounded channel.
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<QueueEvent>,
}

impl ChannelObserver {
    /// Creates the observer and the receiver its events arrive on.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<QueueEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl QueueObserver for ChannelObserver {
    fn on_event(&self, event: &QueueEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event.clone());
    }
}
