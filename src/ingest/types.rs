// src/ingest/types.rs
use crate::news::NewsItem;

/// One page of the listing. `index` is the 0-based ordinal used for striding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub index: u32,
    pub size: u32,
}

impl PageRequest {
    pub fn new(index: u32, size: u32) -> Self {
        Self { index, size }
    }

    /// 1-based page number as the remote API counts pages.
    pub fn number(&self) -> u32 {
        self.index + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    Fetched,
    Failed,
}

/// Items returned by one fetch, in the order the source returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub page: PageRequest,
    pub items: Vec<NewsItem>,
    pub outcome: BatchOutcome,
}

impl Batch {
    pub fn fetched(page: PageRequest, items: Vec<NewsItem>) -> Self {
        Self {
            page,
            items,
            outcome: BatchOutcome::Fetched,
        }
    }

    /// Empty batch standing in for a page whose fetch failed.
    pub fn failed(page: PageRequest) -> Self {
        Self {
            page,
            items: Vec::new(),
            outcome: BatchOutcome::Failed,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http status {status}")]
    Status { status: u16 },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Source of pages. Called concurrently from every worker.
#[async_trait::async_trait]
pub trait PageTransport: Send + Sync {
    async fn fetch_page(&self, page: &PageRequest) -> Result<Vec<NewsItem>, FetchError>;
    fn name(&self) -> &'static str;
}

/// A failed page fetch as handed to a [`FailureObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub page: u32,
    pub cause: String,
}

/// Receives fetch failures. Must not fail or block for long.
pub trait FailureObserver: Send + Sync {
    fn report(&self, failure: &FetchFailure);
}

/// Default observer: a warning in the log plus an error counter.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FailureObserver for TracingObserver {
    fn report(&self, failure: &FetchFailure) {
        tracing::warn!(page = failure.page, cause = %failure.cause, "page fetch failed");
        metrics::counter!("harvest_fetch_errors_total").increment(1);
    }
}

