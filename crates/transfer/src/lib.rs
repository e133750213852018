//! Single-file upload engine.
//!
//! Performs exactly one multipart upload attempt per file, reports progress
//! and a classified outcome as [`TransferEvent`]s, and exposes a
//! [`TransferHandle`] to abort the exchange. The engine knows nothing about
//! queues or concurrency limits.

mod engine;
mod http;
mod payload;
mod progress;
mod record;
mod transport;

use std::path::PathBuf;

pub use engine::{
    EngineEvent, ResponseInfo, TransferEngine, TransferEvent, TransferHandle, TransferOutcome,
};
pub use http::HttpTransport;
pub use payload::FilePayload;
pub use progress::RateEstimator;
pub use record::TransferRecord;
pub use transport::{
    ProgressSink, TransferRequest, Transport, TransportError, TransportFuture, TransportResponse,
    merge_headers,
};

/// Errors produced by the transfer crate outside of an upload attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a regular file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
