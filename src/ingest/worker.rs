// src/ingest/worker.rs
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::fetcher::PageFetcher;
use super::limiter::ConcurrencyLimiter;
use super::queue::{QueueClosed, QueueProducer};
use super::types::{BatchOutcome, PageRequest};

/// Page indices owned by worker `ordinal` out of `workers`: `ordinal, ordinal + W, ...`
/// while below `total_pages`.
pub fn stride(ordinal: u32, workers: u32, total_pages: u32) -> impl Iterator<Item = u32> {
    (ordinal..total_pages).step_by(workers.max(1) as usize)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub ordinal: u32,
    pub pages: u32,
    pub failed_pages: u32,
    pub items: usize,
    pub cancelled: bool,
}

pub struct FetchWorker {
    pub ordinal: u32,
    pub workers: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub fetcher: PageFetcher,
    pub limiter: Arc<ConcurrencyLimiter>,
    pub queue: QueueProducer,
    pub cancel: CancellationToken,
}

impl FetchWorker {
    /// Walk the stride in increasing order: permit, fetch, release, push.
    pub async fn run(self) -> Result<WorkerReport, QueueClosed> {
        let mut report = WorkerReport {
            ordinal: self.ordinal,
            ..WorkerReport::default()
        };

        for index in stride(self.ordinal, self.workers, self.total_pages) {
            let page = PageRequest::new(index, self.page_size);

            let fetched = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                batch = async {
                    let _permit = self.limiter.acquire().await;
                    self.fetcher.fetch(page).await
                } => Some(batch),
            };
            let Some(batch) = fetched else {
                report.cancelled = true;
                break;
            };

            report.pages += 1;
            report.items += batch.len();
            if batch.outcome == BatchOutcome::Failed {
                report.failed_pages += 1;
            }
            self.queue.push(batch)?;
        }

        tracing::debug!(
            worker = report.ordinal,
            pages = report.pages,
            failed = report.failed_pages,
            cancelled = report.cancelled,
            "worker done"
        );
        Ok(report)
    }
}
