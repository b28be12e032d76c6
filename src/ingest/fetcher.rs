// src/ingest/fetcher.rs
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};

use super::types::{Batch, FailureObserver, FetchFailure, PageRequest, PageTransport};

/// Performs single page fetches. Failures become an empty `Failed` batch plus a
/// report to the observer; nothing is retried and nothing propagates.
#[derive(Clone)]
pub struct PageFetcher {
    transport: Arc<dyn PageTransport>,
    observer: Arc<dyn FailureObserver>,
}

impl PageFetcher {
    pub fn new(transport: Arc<dyn PageTransport>, observer: Arc<dyn FailureObserver>) -> Self {
        Self {
            transport,
            observer,
        }
    }

    pub async fn fetch(&self, page: PageRequest) -> Batch {
        let t0 = Instant::now();
        let result = self.transport.fetch_page(&page).await;
        histogram!("harvest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("harvest_pages_total").increment(1);

        match result {
            Ok(items) => {
                tracing::debug!(
                    page = page.index,
                    items = items.len(),
                    transport = self.transport.name(),
                    "page fetched"
                );
                Batch::fetched(page, items)
            }
            Err(e) => {
                self.observer.report(&FetchFailure {
                    page: page.index,
                    cause: e.to_string(),
                });
                Batch::failed(page)
            }
        }
    }
}
