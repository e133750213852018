//! Transport seam between the engine and the network.
//!
//! The engine builds a [`TransferRequest`] and hands it to a [`Transport`];
//! [`HttpTransport`](crate::HttpTransport) is the production implementation,
//! tests plug in scripted ones.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use uplift_protocol::TransportConfig;
use uplift_protocol::constants::{
    DEFAULT_ACCEPT, DEFAULT_CACHE_CONTROL, DEFAULT_REQUESTED_WITH, REQUESTED_WITH_HEADER,
};

use crate::FilePayload;

/// Errors surfaced by a transport before any HTTP response was received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid header {0}")]
    InvalidHeader(String),
}

/// What came back from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Reason phrase, when the status has one.
    pub status_text: Option<String>,
    pub body: String,
}

/// One fully-resolved upload request.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub endpoint: String,
    pub method: String,
    pub use_credentials: bool,
    /// Headers after merging defaults with caller values, in send order.
    pub headers: Vec<(String, String)>,
    /// Extra multipart text fields, sent before the file part.
    pub fields: Vec<(String, String)>,
    pub payload: Arc<FilePayload>,
}

impl TransferRequest {
    /// Builds a request for `payload` from a registration's transport config.
    pub fn build(payload: Arc<FilePayload>, config: &TransportConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            method: config.method.trim().to_ascii_uppercase(),
            use_credentials: config.use_credentials,
            headers: merge_headers(&config.headers),
            fields: config
                .extra_fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            payload,
        }
    }
}

/// Merges caller headers over the default set.
///
/// Names compare case-insensitively and the caller wins on conflict. An
/// empty caller value for a default header keeps the default.
pub fn merge_headers(caller: &BTreeMap<String, String>) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = vec![
        ("Accept".into(), DEFAULT_ACCEPT.into()),
        ("Cache-Control".into(), DEFAULT_CACHE_CONTROL.into()),
        (REQUESTED_WITH_HEADER.into(), DEFAULT_REQUESTED_WITH.into()),
    ];

    for (name, value) in caller {
        match headers
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some(_) if value.is_empty() => {}
            Some(slot) => *slot = (name.clone(), value.clone()),
            None => headers.push((name.clone(), value.clone())),
        }
    }

    headers
}

/// Receives `(loaded, total)` byte counts while the body is being sent.
#[derive(Clone)]
pub struct ProgressSink(Arc<dyn Fn(u64, u64) + Send + Sync>);

impl ProgressSink {
    pub fn new(report: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        Self(Arc::new(report))
    }

    /// A sink that discards every report.
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    pub fn report(&self, loaded: u64, total: u64) {
        (self.0)(loaded, total)
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProgressSink")
    }
}

/// Boxed future returned by [`Transport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = Result<TransportResponse, TransportError>> + Send + 'a>>;

/// Performs the network exchange for one request.
///
/// Implementations report body progress through `progress` and resolve once
/// the server answered (any status) or the exchange failed. Dropping the
/// returned future must abort the exchange.
pub trait Transport: Send + Sync {
    fn send(&self, request: TransferRequest, progress: ProgressSink) -> TransportFuture<'_>;
}
