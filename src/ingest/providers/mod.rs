pub mod fixture;
pub mod kudago;

use serde::Deserialize;

use crate::news::NewsItem;

/// Envelope of one listing page: `{"results": [...]}`; other keys are ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ListingPage {
    #[serde(default)]
    pub results: Vec<NewsItem>,
}

pub(crate) fn decode_listing(body: &str) -> Result<Vec<NewsItem>, serde_json::Error> {
    let page: ListingPage = serde_json::from_str(body)?;
    Ok(page.results)
}
