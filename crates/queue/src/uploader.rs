//! Registration layer binding input sources to one queue.
//!
//! A source carries the transport settings for everything admitted through
//! it. Unregistering a source only stops further admissions; files already
//! queued keep their own reference to the settings.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use uplift_protocol::{QueueOptions, TransportConfig};
use uplift_transfer::{FilePayload, Transport};

use crate::error::UploaderError;
use crate::handle::FileHandle;
use crate::observer::QueueObserver;
use crate::service::UploadQueue;
use crate::state::PendingFile;

/// Identifies a registered input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "source-{}", self.0)
    }
}

pub struct Uploader {
    queue: UploadQueue,
    sources: HashMap<SourceId, Arc<TransportConfig>>,
    next_source: u64,
}

impl Uploader {
    /// Spawns a queue over `transport`. Must be called within a tokio runtime.
    pub fn new(options: QueueOptions, transport: Arc<dyn Transport>) -> Self {
        Self::from_queue(UploadQueue::spawn(options, transport))
    }

    pub fn from_queue(queue: UploadQueue) -> Self {
        Self {
            queue,
            sources: HashMap::new(),
            next_source: 1,
        }
    }

    pub fn queue(&self) -> &UploadQueue {
        &self.queue
    }

    pub fn subscribe(&self, observer: Arc<dyn QueueObserver>) {
        self.queue.subscribe(observer);
    }

    pub fn set_options(&self, options: QueueOptions) {
        self.queue.set_options(options);
    }

    pub fn register_source(&mut self, transport: TransportConfig) -> SourceId {
        let id = SourceId(self.next_source);
        self.next_source += 1;
        debug!(source = %id, endpoint = %transport.endpoint, "source registered");
        self.sources.insert(id, Arc::new(transport));
        id
    }

    /// Returns `false` if the source was not registered.
    pub fn unregister_source(&mut self, id: SourceId) -> bool {
        let removed = self.sources.remove(&id).is_some();
        if removed {
            debug!(source = %id, "source unregistered");
        }
        removed
    }

    /// Admits `paths` through `source` as one batch.
    ///
    /// Every path must be a readable regular file; if any is not, nothing is
    /// admitted.
    pub async fn put_files(
        &self,
        source: SourceId,
        paths: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Result<Vec<FileHandle>, UploaderError> {
        let transport = self
            .sources
            .get(&source)
            .cloned()
            .ok_or(UploaderError::UnknownSource(source))?;

        let mut files = Vec::new();
        for path in paths {
            let payload = FilePayload::from_path(path.into()).await?;
            files.push(PendingFile::new(Arc::new(payload), Arc::clone(&transport)));
        }

        info!(source = %source, count = files.len(), "putting files");
        Ok(self.queue.admit(files))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use uplift_protocol::UploadStatus;
    use uplift_transfer::{
        ProgressSink, TransferRequest, TransportError, TransportFuture, TransportResponse,
    };

    use super::*;
    use crate::observer::{ChannelObserver, QueueEvent};

    /// Transport that never answers.
    struct Silent;

    impl Transport for Silent {
        fn send(&self, _request: TransferRequest, _progress: ProgressSink) -> TransportFuture<'_> {
            Box::pin(std::future::pending::<Result<TransportResponse, TransportError>>())
        }
    }

    fn uploader(auto_start: bool) -> Uploader {
        Uploader::new(
            QueueOptions {
                max_parallel_uploads: 0,
                auto_start,
                auto_remove: false,
            },
            Arc::new(Silent),
        )
    }

    fn write(dir: &tempfile::TempDir, name: &str, size: usize) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![0u8; size]).unwrap();
        path
    }

    #[tokio::test]
    async fn put_files_admits_batch() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.txt", 3);
        let b = write(&dir, "b.txt", 5);

        let mut up = uploader(false);
        let source = up.register_source(TransportConfig::new("http://localhost/upload"));
        let handles = up.put_files(source, [a, b]).await.unwrap();
        assert_eq!(handles.len(), 2);

        let files = up.queue().snapshot().await;
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].name, "a.txt");
        assert_eq!(files[0].size, 3);
        assert_eq!(files[1].name, "b.txt");
        assert!(files.iter().all(|f| f.status == UploadStatus::Queued));
        assert_eq!(files[0].id, handles[0].id());
    }

    #[tokio::test]
    async fn bad_path_admits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let good = write(&dir, "a.txt", 3);

        let mut up = uploader(false);
        let source = up.register_source(TransportConfig::new("http://localhost/upload"));

        let err = up
            .put_files(source, [good.clone(), dir.path().to_path_buf()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploaderError::Transfer(uplift_transfer::TransferError::NotAFile(_))
        ));

        let err = up
            .put_files(source, [good, dir.path().join("missing")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploaderError::Transfer(uplift_transfer::TransferError::Io(_))
        ));

        assert!(up.queue().snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn unregistered_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.txt", 1);

        let mut up = uploader(false);
        let source = up.register_source(TransportConfig::new("http://localhost/upload"));
        assert!(up.unregister_source(source));
        assert!(!up.unregister_source(source));

        let err = up.put_files(source, [path]).await.unwrap_err();
        assert!(matches!(err, UploaderError::UnknownSource(id) if id == source));
        assert_eq!(err.to_string(), format!("unknown source: {source}"));
    }

    #[tokio::test]
    async fn admitted_files_survive_unregistration() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "a.txt", 1);

        let mut up = uploader(true);
        let (observer, mut events) = ChannelObserver::new();
        up.subscribe(observer);
        let source = up.register_source(TransportConfig::new("http://localhost/upload"));
        let handles = up.put_files(source, [path]).await.unwrap();
        up.unregister_source(source);

        let started = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match events.recv().await {
                    Some(QueueEvent::UploadStarted(f)) => break f,
                    Some(_) => continue,
                    None => panic!("queue closed"),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(started.id, handles[0].id());
    }

    #[test]
    fn source_ids_are_distinct() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let _guard = rt.enter();
        let mut up = uploader(false);
        let a = up.register_source(TransportConfig::default());
        let b = up.register_source(TransportConfig::default());
        assert_ne!(a, b);
        assert_eq!(a.to_string(), "source-1");
    }
}
