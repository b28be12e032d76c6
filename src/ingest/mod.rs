// src/ingest/mod.rs
pub mod fetcher;
pub mod limiter;
pub mod providers;
pub mod queue;
pub mod types;
pub mod worker;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::FixedOffset;
use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::ingest::fetcher::PageFetcher;
use crate::ingest::limiter::ConcurrencyLimiter;
use crate::ingest::queue::{fan_in, QueueClosed};
use crate::ingest::types::{FailureObserver, PageTransport};
use crate::ingest::worker::{FetchWorker, WorkerReport};
use crate::sink::{
    open_destination, Destination, RecordFormat, SinkError, SinkWriter, WriteReport,
};

/// One-time metrics registration (so series show up in the exporter).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("harvest_pages_total", "Page fetches attempted.");
        describe_counter!(
            "harvest_fetch_errors_total",
            "Page fetches that failed (status, network, decode)."
        );
        describe_counter!(
            "harvest_items_written_total",
            "Items appended to the destination."
        );
        describe_histogram!("harvest_fetch_ms", "Page fetch time in milliseconds.");
        describe_gauge!(
            "harvest_last_run_ts",
            "Unix ts when the harvest pipeline last finished."
        );
    });
}

/// Everything a single run needs. No defaults here; the config layer supplies them.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub workers: u32,
    pub max_concurrent: usize,
    pub total_pages: u32,
    pub page_size: u32,
    pub format: RecordFormat,
    pub tz: FixedOffset,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.workers == 0 {
            return Err(PipelineError::InvalidConfig("workers must be >= 1"));
        }
        if self.max_concurrent == 0 {
            return Err(PipelineError::InvalidConfig("max_concurrent must be >= 1"));
        }
        if self.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(PipelineError::InvalidConfig("max_concurrent is too large"));
        }
        if self.page_size == 0 {
            return Err(PipelineError::InvalidConfig("page_size must be >= 1"));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid pipeline config: {0}")]
    InvalidConfig(&'static str),
    #[error("destination already exists: {0}")]
    DestinationExists(String),
    #[error("sink write failed: {0}")]
    Sink(#[source] SinkError),
    #[error(transparent)]
    QueueClosed(#[from] QueueClosed),
    #[error("pipeline task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

impl From<SinkError> for PipelineError {
    fn from(e: SinkError) -> Self {
        match e {
            SinkError::AlreadyExists(target) => PipelineError::DestinationExists(target),
            other => PipelineError::Sink(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pages: u32,
    pub failed_pages: u32,
    pub items_fetched: usize,
    pub written: WriteReport,
    pub cancelled: bool,
    pub peak_in_flight: usize,
    pub permits_acquired: u64,
    pub permits_released: u64,
    pub elapsed: Duration,
}

/// Run the pipeline to completion. See [`run_pipeline_with_cancel`].
pub async fn run_pipeline(
    transport: Arc<dyn PageTransport>,
    observer: Arc<dyn FailureObserver>,
    destination: Arc<dyn Destination>,
    cfg: PipelineConfig,
) -> Result<RunSummary, PipelineError> {
    run_pipeline_with_cancel(
        transport,
        observer,
        destination,
        cfg,
        CancellationToken::new(),
    )
    .await
}

/// Fetch `cfg.total_pages` pages with `cfg.workers` striped workers, at most
/// `cfg.max_concurrent` fetches in flight, and write every batch through one writer.
///
/// An existing destination is refused before any task is spawned. Cancelling
/// `cancel` stops the workers; whatever was queued is still written and flushed.
pub async fn run_pipeline_with_cancel(
    transport: Arc<dyn PageTransport>,
    observer: Arc<dyn FailureObserver>,
    destination: Arc<dyn Destination>,
    cfg: PipelineConfig,
    cancel: CancellationToken,
) -> Result<RunSummary, PipelineError> {
    ensure_metrics_described();
    cfg.validate()?;

    if destination.exists() {
        let target = destination.describe();
        tracing::error!(
            destination = %target,
            "destination already exists, refusing to overwrite"
        );
        return Err(PipelineError::DestinationExists(target));
    }

    // Exclusive create also catches a destination that appeared after the check.
    let sink = open_destination(destination.as_ref())?;

    let t0 = Instant::now();
    let limiter = Arc::new(
        ConcurrencyLimiter::new(cfg.max_concurrent)
            .map_err(|_| PipelineError::InvalidConfig("max_concurrent is out of range"))?,
    );
    let (producer, consumer) = fan_in();
    let fetcher = PageFetcher::new(transport, observer);

    tracing::info!(
        workers = cfg.workers,
        max_concurrent = cfg.max_concurrent,
        pages = cfg.total_pages,
        page_size = cfg.page_size,
        destination = %destination.describe(),
        "harvest started"
    );

    let writer = {
        let sink_writer = SinkWriter::new(cfg.format, cfg.tz, destination.describe());
        tokio::task::spawn_blocking(move || sink_writer.run(sink, consumer))
    };

    let workers: Vec<_> = (0..cfg.workers)
        .map(|ordinal| {
            let worker = FetchWorker {
                ordinal,
                workers: cfg.workers,
                total_pages: cfg.total_pages,
                page_size: cfg.page_size,
                fetcher: fetcher.clone(),
                limiter: limiter.clone(),
                queue: producer.clone(),
                cancel: cancel.clone(),
            };
            tokio::spawn(worker.run())
        })
        .collect();

    // Join every worker before closing, even if one of them failed.
    let mut reports: Vec<WorkerReport> = Vec::with_capacity(workers.len());
    let mut worker_error: Option<PipelineError> = None;
    for handle in workers {
        match handle.await {
            Ok(Ok(report)) => reports.push(report),
            Ok(Err(e)) => {
                worker_error.get_or_insert(e.into());
            }
            Err(e) => {
                worker_error.get_or_insert(e.into());
            }
        }
    }
    producer.close();
    drop(producer);

    let written = writer.await?;
    let written = match written {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "sink writer failed");
            return Err(e.into());
        }
    };
    if let Some(e) = worker_error {
        return Err(e);
    }

    let summary = RunSummary {
        pages: reports.iter().map(|r| r.pages).sum(),
        failed_pages: reports.iter().map(|r| r.failed_pages).sum(),
        items_fetched: reports.iter().map(|r| r.items).sum(),
        written,
        cancelled: reports.iter().any(|r| r.cancelled),
        peak_in_flight: limiter.peak_in_flight(),
        permits_acquired: limiter.acquisitions(),
        permits_released: limiter.releases(),
        elapsed: t0.elapsed(),
    };

    let now = chrono::Utc::now().timestamp().max(0) as u64;
    gauge!("harvest_last_run_ts").set(now as f64);

    tracing::info!(
        pages = summary.pages,
        failed = summary.failed_pages,
        items = summary.written.items,
        cancelled = summary.cancelled,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "harvest finished"
    );

    Ok(summary)
}
