use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::decode_listing;
use crate::ingest::types::{FetchError, PageRequest, PageTransport};
use crate::news::NewsItem;

pub const DEFAULT_BASE_URL: &str = "https://kudago.com";
const NEWS_PATH: &str = "/public-api/v1.4/news/";
pub const FIELDS: &str =
    "id,publication_date,title,place,description,site_url,favorites_count,comments_count";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_location() -> String {
    "spb".to_string()
}
fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_request_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KudaGoSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for KudaGoSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            location: default_location(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// KudaGo public news listing, ordered by date.
pub struct KudaGoTransport {
    http: Client,
    endpoint: String,
    location: String,
}

impl KudaGoTransport {
    pub fn new(settings: &KudaGoSettings) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(concat!("news-harvester/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: format!("{}{}", settings.base_url.trim_end_matches('/'), NEWS_PATH),
            location: settings.location.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PageTransport for KudaGoTransport {
    async fn fetch_page(&self, page: &PageRequest) -> Result<Vec<NewsItem>, FetchError> {
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("page", page.number().to_string()),
                ("page_size", page.size.to_string()),
                ("order_by", "date".to_string()),
                ("location", self.location.clone()),
                ("fields", FIELDS.to_string()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body = resp.text().await?;
        Ok(decode_listing(&body)?)
    }

    fn name(&self) -> &'static str {
        "kudago"
    }
}
