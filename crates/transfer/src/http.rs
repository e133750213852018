//! Multipart HTTP transport built on `reqwest`.
//!
//! The file is streamed from disk; progress is reported as the body stream
//! is consumed by the client.

use futures_util::TryStreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method};
use tokio_util::io::ReaderStream;
use tracing::debug;

use uplift_protocol::constants::FILE_FIELD_NAME;

use crate::TransferError;
use crate::transport::{
    ProgressSink, TransferRequest, Transport, TransportError, TransportFuture, TransportResponse,
};

const FILE_MIME: &str = "application/octet-stream";

/// Production transport: one multipart request per file.
pub struct HttpTransport {
    plain: reqwest::Client,
    /// Keeps cookies across requests for configs with `use_credentials`.
    with_credentials: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransferError> {
        Ok(Self {
            plain: reqwest::Client::builder().build()?,
            with_credentials: reqwest::Client::builder().cookie_store(true).build()?,
        })
    }

    async fn execute(
        &self,
        request: TransferRequest,
        progress: ProgressSink,
    ) -> Result<TransportResponse, TransportError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(request.method.clone()))?;
        let headers = header_map(&request.headers)?;
        let form = multipart_form(&request, progress).await?;

        let client = if request.use_credentials {
            &self.with_credentials
        } else {
            &self.plain
        };

        debug!(
            endpoint = %request.endpoint,
            method = %method,
            file = %request.payload.name,
            size = request.payload.size,
            "sending upload request"
        );

        let resp = client
            .request(method, &request.endpoint)
            .headers(headers)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        // A body cut short is a network failure even after a 200 status line.
        let body = resp.text().await?;

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().map(str::to_string),
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: TransferRequest, progress: ProgressSink) -> TransportFuture<'_> {
        Box::pin(self.execute(request, progress))
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, TransportError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
        // The multipart encoder owns the content type (it carries the boundary).
        if header == CONTENT_TYPE {
            debug!("ignoring caller Content-Type header");
            continue;
        }
        let value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidHeader(name.clone()))?;
        map.insert(header, value);
    }
    Ok(map)
}

async fn multipart_form(
    request: &TransferRequest,
    progress: ProgressSink,
) -> Result<Form, TransportError> {
    let file = tokio::fs::File::open(&request.payload.path).await?;
    let total = request.payload.size;

    let mut loaded = 0u64;
    let stream = ReaderStream::new(file).inspect_ok(move |chunk| {
        loaded = (loaded + chunk.len() as u64).min(total);
        progress.report(loaded, total);
    });

    let part = Part::stream_with_length(Body::wrap_stream(stream), total)
        .file_name(request.payload.name.clone())
        .mime_str(FILE_MIME)?;

    let mut form = Form::new();
    for (name, value) in &request.fields {
        form = form.text(name.clone(), value.clone());
    }
    Ok(form.part(FILE_FIELD_NAME, part))
}
