//! Wires the scanner, the uploader and the observers together for one run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use uplift_protocol::{QueueOptions, TransportConfig};
use uplift_queue::{ChannelObserver, QueueEvent, Uploader};
use uplift_transfer::{HttpTransport, Transport};

use crate::config::UpliftConfig;
use crate::report::{LoggingObserver, Report, ReportObserver};
use crate::scanner;

/// Uploads `paths` and returns once the queue has drained.
///
/// Ctrl-C clears the queue, which cancels whatever is still in flight.
pub async fn run(config: UpliftConfig, paths: &[PathBuf]) -> anyhow::Result<Report> {
    let transport: Arc<dyn Transport> =
        Arc::new(HttpTransport::new().context("failed to build HTTP client")?);
    upload(config.queue, config.transport, paths, transport, shutdown_signal()).await
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; never resolve.
        std::future::pending::<()>().await;
    }
}

pub(crate) async fn upload(
    options: QueueOptions,
    transport_config: TransportConfig,
    paths: &[PathBuf],
    transport: Arc<dyn Transport>,
    shutdown: impl std::future::Future<Output = ()>,
) -> anyhow::Result<Report> {
    if transport_config.endpoint.trim().is_empty() {
        anyhow::bail!("no endpoint configured; pass --endpoint or set transport.endpoint");
    }

    let files = scanner::expand_paths(paths).context("failed to read input paths")?;
    if files.is_empty() {
        anyhow::bail!("nothing to upload");
    }

    tracing::info!(
        endpoint = %transport_config.endpoint,
        method = %transport_config.method,
        files = files.len(),
        max_parallel = options.max_parallel_uploads,
        "starting upload"
    );

    let mut uploader = Uploader::new(options, transport);
    let report = Arc::new(ReportObserver::default());
    let (events_observer, mut events) = ChannelObserver::new();
    uploader.subscribe(Arc::new(LoggingObserver));
    uploader.subscribe(report.clone());
    uploader.subscribe(events_observer);

    let source = uploader.register_source(transport_config);
    uploader.put_files(source, files).await?;

    wait_until_drained(&uploader, &mut events, shutdown).await?;

    Ok(report.report())
}

async fn wait_until_drained(
    uploader: &Uploader,
    events: &mut mpsc::UnboundedReceiver<QueueEvent>,
    shutdown: impl std::future::Future<Output = ()>,
) -> anyhow::Result<()> {
    tokio::pin!(shutdown);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(QueueEvent::AllFinished) => return Ok(()),
                Some(_) => {}
                None => anyhow::bail!("upload queue stopped unexpectedly"),
            },
            _ = &mut shutdown, if !interrupted => {
                tracing::warn!("interrupted, canceling remaining uploads");
                interrupted = true;
                uploader.queue().clear();
            }
        }
    }
}
