use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::decode_listing;
use crate::ingest::types::{FetchError, PageRequest, PageTransport};
use crate::news::NewsItem;

/// Serves pre-recorded listing pages. Page `i` is the `i`-th body; a page past the
/// end answers 404 like the live API does.
pub struct FixtureTransport {
    pages: Vec<String>,
}

impl FixtureTransport {
    pub fn from_pages(pages: Vec<String>) -> Self {
        Self { pages }
    }

    /// Load `page-1.json`, `page-2.json`, ... from `dir` until the first gap.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut pages = Vec::new();
        loop {
            let path = dir.join(format!("page-{}.json", pages.len() + 1));
            if !path.exists() {
                break;
            }
            let body = fs::read_to_string(&path)
                .with_context(|| format!("reading fixture page {}", path.display()))?;
            pages.push(body);
        }
        if pages.is_empty() {
            anyhow::bail!("no page-N.json fixtures in {}", dir.display());
        }
        Ok(Self { pages })
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[async_trait]
impl PageTransport for FixtureTransport {
    async fn fetch_page(&self, page: &PageRequest) -> Result<Vec<NewsItem>, FetchError> {
        let Some(body) = self.pages.get(page.index as usize) else {
            return Err(FetchError::Status { status: 404 });
        };
        let mut items = decode_listing(body)?;
        items.truncate(page.size as usize);
        Ok(items)
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}
