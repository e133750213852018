//! Transfer engine: one upload attempt per call.
//!
//! `begin_transfer` spawns the exchange and returns at once. Progress and the
//! classified outcome come back as [`EngineEvent`]s on the channel handed out
//! by [`TransferEngine::new`]; the owner of the record applies them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use uplift_protocol::constants::{INVALID_RESPONSE_TEXT, NO_RESPONSE_CODE, SUCCESS_STATUS};
use uplift_protocol::{FileId, TransportConfig, UploadStatus};

use crate::TransferRecord;
use crate::transport::{ProgressSink, TransferRequest, Transport, TransportError, TransportResponse};

/// Response details recorded on a finished record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseInfo {
    pub code: u16,
    pub text: String,
    pub body: String,
}

/// Classified result of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Uploaded(ResponseInfo),
    Failed(ResponseInfo),
}

impl TransferOutcome {
    /// Only HTTP 200 counts as success; anything else, including other 2xx
    /// codes and transport errors, is a failure.
    pub fn classify(result: Result<TransportResponse, TransportError>) -> Self {
        match result {
            Ok(resp) => {
                let info = ResponseInfo {
                    code: resp.status,
                    text: resp
                        .status_text
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| INVALID_RESPONSE_TEXT.to_string()),
                    body: resp.body,
                };
                if resp.status == SUCCESS_STATUS {
                    Self::Uploaded(info)
                } else {
                    Self::Failed(info)
                }
            }
            Err(_) => Self::Failed(ResponseInfo {
                code: NO_RESPONSE_CODE,
                text: INVALID_RESPONSE_TEXT.to_string(),
                body: String::new(),
            }),
        }
    }

    pub fn response(&self) -> &ResponseInfo {
        match self {
            Self::Uploaded(r) | Self::Failed(r) => r,
        }
    }
}

/// Something that happened to one in-flight transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    Progress { loaded: u64, total: u64 },
    Completed(TransferOutcome),
}

/// A [`TransferEvent`] tagged with the file it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub id: FileId,
    pub event: TransferEvent,
}

/// Cancel capability for one in-flight transfer.
#[derive(Debug, Clone, Default)]
pub struct TransferHandle {
    token: CancellationToken,
}

impl TransferHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Aborts the exchange and forces `record` to `Canceled`.
    ///
    /// Returns `false` without side effects once the record is no longer
    /// uploading.
    pub fn cancel(&self, record: &mut TransferRecord) -> bool {
        if record.status() != UploadStatus::Uploading {
            return false;
        }
        self.token.cancel();
        record.mark_canceled()
    }

    /// Aborts the exchange without touching any record.
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Spawns upload attempts over a shared [`Transport`].
pub struct TransferEngine {
    transport: Arc<dyn Transport>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
}

impl TransferEngine {
    /// Creates an engine and the receiver its events arrive on.
    pub fn new(transport: Arc<dyn Transport>) -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                transport,
                events_tx,
            },
            events_rx,
        )
    }

    /// Starts one upload attempt for `record`.
    ///
    /// Must be called from within a tokio runtime. The caller is expected to
    /// have moved the record to `Uploading`; the engine does not check.
    pub fn begin_transfer(
        &self,
        record: &TransferRecord,
        config: &TransportConfig,
    ) -> TransferHandle {
        let id = record.id();
        let size = record.payload().size;
        let request = TransferRequest::build(Arc::clone(record.payload()), config);
        let token = CancellationToken::new();

        debug!(
            file = %id,
            endpoint = %request.endpoint,
            method = %request.method,
            "beginning transfer"
        );

        let complete_seen = Arc::new(AtomicBool::new(false));
        let sink = {
            let tx = self.events_tx.clone();
            let token = token.clone();
            let complete_seen = Arc::clone(&complete_seen);
            ProgressSink::new(move |loaded, total| {
                if token.is_cancelled() {
                    return;
                }
                if loaded >= total {
                    complete_seen.store(true, Ordering::Release);
                }
                let _ = tx.send(EngineEvent {
                    id,
                    event: TransferEvent::Progress { loaded, total },
                });
            })
        };

        let transport = Arc::clone(&self.transport);
        let tx = self.events_tx.clone();
        let task_token = token.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                _ = task_token.cancelled() => {
                    debug!(file = %id, "transfer aborted");
                    return;
                }
                result = transport.send(request, sink) => result,
            };
            if task_token.is_cancelled() {
                return;
            }

            match &result {
                Ok(resp) => {
                    if resp.status != SUCCESS_STATUS {
                        warn!(file = %id, status = resp.status, "server rejected upload");
                    }
                    // Any response means the body went out in full.
                    if !complete_seen.load(Ordering::Acquire) {
                        let _ = tx.send(EngineEvent {
                            id,
                            event: TransferEvent::Progress {
                                loaded: size,
                                total: size,
                            },
                        });
                    }
                }
                Err(e) => warn!(file = %id, error = %e, "upload transport failed"),
            }

            let outcome = TransferOutcome::classify(result);
            let _ = tx.send(EngineEvent {
                id,
                event: TransferEvent::Completed(outcome),
            });
        });

        TransferHandle::new(token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::FilePayload;
    use crate::transport::TransportFuture;

    /// Transport that reports the given progress steps, then resolves.
    struct ScriptedTransport {
        steps: Vec<(u64, u64)>,
        response: Mutex<Option<Result<TransportResponse, TransportError>>>,
    }

    impl ScriptedTransport {
        fn new(steps: Vec<(u64, u64)>, response: Result<TransportResponse, TransportError>) -> Self {
            Self {
                steps,
                response: Mutex::new(Some(response)),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, _request: TransferRequest, progress: ProgressSink) -> TransportFuture<'_> {
            Box::pin(async move {
                for (loaded, total) in &self.steps {
                    progress.report(*loaded, *total);
                }
                self.response
                    .lock()
                    .unwrap()
                    .take()
                    .unwrap_or_else(|| Err(TransportError::InvalidMethod("reused".into())))
            })
        }
    }

    /// Transport that never resolves.
    struct StalledTransport;

    impl Transport for StalledTransport {
        fn send(&self, _request: TransferRequest, progress: ProgressSink) -> TransportFuture<'_> {
            Box::pin(async move {
                progress.report(10, 100);
                std::future::pending::<Result<TransportResponse, TransportError>>().await
            })
        }
    }

    fn ok(status: u16, text: Option<&str>) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status,
            status_text: text.map(str::to_string),
            body: "resp".into(),
        })
    }

    fn uploading_record(size: u64) -> TransferRecord {
        let mut record = TransferRecord::new(
            FileId::new(),
            Arc::new(FilePayload::new("/tmp/a.bin", "a.bin", size)),
        );
        record.begin();
        record
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            let done = matches!(ev.event, TransferEvent::Completed(_));
            events.push(ev.event);
            if done {
                break;
            }
        }
        events
    }

    #[test]
    fn classify_200_is_uploaded() {
        let outcome = TransferOutcome::classify(ok(200, Some("OK")));
        assert_eq!(
            outcome,
            TransferOutcome::Uploaded(ResponseInfo {
                code: 200,
                text: "OK".into(),
                body: "resp".into(),
            })
        );
    }

    #[test]
    fn classify_other_2xx_is_failed() {
        let outcome = TransferOutcome::classify(ok(201, Some("Created")));
        assert!(matches!(outcome, TransferOutcome::Failed(ref r) if r.code == 201));
        assert_eq!(outcome.response().text, "Created");
    }

    #[test]
    fn classify_missing_status_text_uses_fallback() {
        let outcome = TransferOutcome::classify(ok(599, None));
        assert_eq!(outcome.response().text, INVALID_RESPONSE_TEXT);
        assert_eq!(outcome.response().code, 599);
    }

    #[test]
    fn classify_transport_error() {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let outcome = TransferOutcome::classify(Err(err.into()));
        assert_eq!(
            outcome,
            TransferOutcome::Failed(ResponseInfo {
                code: 0,
                text: INVALID_RESPONSE_TEXT.into(),
                body: String::new(),
            })
        );
    }

    #[tokio::test]
    async fn success_reports_progress_then_uploaded() {
        let transport = ScriptedTransport::new(vec![(500, 1000), (1000, 1000)], ok(200, Some("OK")));
        let (engine, mut rx) = TransferEngine::new(Arc::new(transport));
        let mut record = uploading_record(1000);

        let _handle = engine.begin_transfer(&record, &TransportConfig::new("http://x"));
        let events = drain(&mut rx).await;

        assert_eq!(
            events[..2],
            [
                TransferEvent::Progress { loaded: 500, total: 1000 },
                TransferEvent::Progress { loaded: 1000, total: 1000 },
            ]
        );
        assert_eq!(events.len(), 3);

        for event in &events {
            match event {
                TransferEvent::Progress { loaded, total } => {
                    record.apply_progress(*loaded, *total);
                }
                TransferEvent::Completed(outcome) => {
                    record.complete(outcome);
                }
            }
        }
        assert_eq!(record.status(), UploadStatus::Uploaded);
        assert_eq!(record.progress(), 100);
        assert_eq!(record.bytes_sent(), 1000);
        assert_eq!(record.response_code(), 200);
    }

    #[tokio::test]
    async fn missing_final_progress_is_synthesized() {
        let transport = ScriptedTransport::new(vec![(10, 40)], ok(200, Some("OK")));
        let (engine, mut rx) = TransferEngine::new(Arc::new(transport));
        let record = uploading_record(40);

        let _handle = engine.begin_transfer(&record, &TransportConfig::new("http://x"));
        let events = drain(&mut rx).await;

        assert_eq!(
            events[1],
            TransferEvent::Progress {
                loaded: 40,
                total: 40
            }
        );
        assert!(matches!(events[2], TransferEvent::Completed(TransferOutcome::Uploaded(_))));
    }

    #[tokio::test]
    async fn rejected_upload_is_failed() {
        let transport = ScriptedTransport::new(vec![], ok(500, Some("Internal Server Error")));
        let (engine, mut rx) = TransferEngine::new(Arc::new(transport));
        let record = uploading_record(8);

        let _handle = engine.begin_transfer(&record, &TransportConfig::new("http://x"));
        let events = drain(&mut rx).await;

        assert_eq!(events[0], TransferEvent::Progress { loaded: 8, total: 8 });
        match events.last() {
            Some(TransferEvent::Completed(TransferOutcome::Failed(r))) => {
                assert_eq!(r.code, 500);
                assert_eq!(r.text, "Internal Server Error");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn transport_error_is_failed_without_progress() {
        let err = std::io::Error::new(std::io::ErrorKind::TimedOut, "timeout");
        let transport = ScriptedTransport::new(vec![], Err(err.into()));
        let (engine, mut rx) = TransferEngine::new(Arc::new(transport));
        let mut record = uploading_record(8);

        let _handle = engine.begin_transfer(&record, &TransportConfig::new("http://x"));
        let events = drain(&mut rx).await;

        assert_eq!(events.len(), 1);
        let TransferEvent::Completed(outcome) = &events[0] else {
            panic!("expected completion");
        };
        record.complete(outcome);
        assert_eq!(record.status(), UploadStatus::Failed);
        assert_eq!(record.response_code(), 0);
        assert_eq!(record.response_text(), "Invalid response from server");
    }

    #[tokio::test]
    async fn cancel_aborts_and_silences_transfer() {
        let (engine, mut rx) = TransferEngine::new(Arc::new(StalledTransport));
        let mut record = uploading_record(100);

        let handle = engine.begin_transfer(&record, &TransportConfig::new("http://x"));
        let first = rx.recv().await.unwrap();
        assert_eq!(first.event, TransferEvent::Progress { loaded: 10, total: 100 });

        assert!(handle.cancel(&mut record));
        assert!(handle.is_aborted());
        assert_eq!(record.status(), UploadStatus::Canceled);

        // Idempotent.
        assert!(!handle.cancel(&mut record));

        let late = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(late.is_err(), "no events after cancel");
    }

    #[tokio::test]
    async fn cancel_after_completion_is_noop() {
        let transport = ScriptedTransport::new(vec![], ok(200, Some("OK")));
        let (engine, mut rx) = TransferEngine::new(Arc::new(transport));
        let mut record = uploading_record(1);

        let handle = engine.begin_transfer(&record, &TransportConfig::new("http://x"));
        for event in drain(&mut rx).await {
            if let TransferEvent::Completed(outcome) = event {
                record.complete(&outcome);
            }
        }

        assert!(!handle.cancel(&mut record));
        assert_eq!(record.status(), UploadStatus::Uploaded);
    }
}
