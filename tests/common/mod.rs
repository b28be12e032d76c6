// Shared stubs for pipeline integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use news_harvester::ingest::types::{
    FailureObserver, FetchError, FetchFailure, PageRequest, PageTransport,
};
use news_harvester::news::offset_from_hours;
use news_harvester::sink::{RecordFormat, StoredItem};
use news_harvester::{NewsItem, PipelineConfig};

pub fn tagged_item(page: u32, n: u32) -> NewsItem {
    NewsItem {
        id: (page as i64) * 1_000 + n as i64,
        publication_date: 1_717_236_000,
        title: format!("page {page} item {n}"),
        place: None,
        description: String::new(),
        site_url: format!("https://example.test/{page}/{n}"),
        favorites_count: n as u64,
        comments_count: 0,
    }
}

/// Returns `per_page` items tagged with the page index; fails on listed pages.
/// Tracks how many calls are active at once.
pub struct TaggedTransport {
    pub per_page: u32,
    pub fail_on: HashSet<u32>,
    pub delay: Duration,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub calls: AtomicUsize,
}

impl TaggedTransport {
    pub fn new(per_page: u32) -> Self {
        Self {
            per_page,
            fail_on: HashSet::new(),
            delay: Duration::ZERO,
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_on(mut self, pages: &[u32]) -> Self {
        self.fail_on = pages.iter().copied().collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl PageTransport for TaggedTransport {
    async fn fetch_page(&self, page: &PageRequest) -> Result<Vec<NewsItem>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = if self.fail_on.contains(&page.index) {
            Err(FetchError::Status { status: 500 })
        } else {
            Ok((0..self.per_page).map(|n| tagged_item(page.index, n)).collect())
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "tagged"
    }
}

pub fn config(workers: u32, max_concurrent: usize, total_pages: u32) -> PipelineConfig {
    PipelineConfig {
        workers,
        max_concurrent,
        total_pages,
        page_size: 10,
        format: RecordFormat::Jsonl,
        tz: offset_from_hours(0),
    }
}

pub fn read_jsonl(path: &std::path::Path) -> Vec<NewsItem> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str::<StoredItem>(l).unwrap().item)
        .collect()
}

/// Keeps every failure report so tests can assert on them.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    failures: parking_lot::Mutex<Vec<FetchFailure>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failures(&self) -> Vec<FetchFailure> {
        self.failures.lock().clone()
    }
}

impl FailureObserver for RecordingObserver {
    fn report(&self, failure: &FetchFailure) {
        self.failures.lock().push(failure.clone());
    }
}
