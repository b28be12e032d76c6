//! news.rs — the record type carried through the pipeline.
//!
//! `NewsItem` mirrors one entry of the listing endpoint. Rating and calendar date are
//! derived on read and never stored.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Place {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    pub id: i64,
    pub publication_date: i64, // unix seconds
    pub title: String,
    #[serde(default)]
    pub place: Option<Place>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub favorites_count: u64,
    #[serde(default)]
    pub comments_count: u64,
}

/// Largest f64 below 1.
const MAX_RATING: f64 = 1.0 - f64::EPSILON / 2.0;

impl NewsItem {
    /// Logistic score of favorites relative to comments. Always in (0, 1).
    pub fn rating(&self) -> f64 {
        let x = self.favorites_count as f64 / (self.comments_count as f64 + 1.0);
        // The logistic rounds to exactly 1.0 once x passes ~37.
        (1.0 / (1.0 + (-x).exp())).min(MAX_RATING)
    }

    /// Calendar date of the publication timestamp in `tz`.
    pub fn date(&self, tz: &FixedOffset) -> Option<NaiveDate> {
        DateTime::<Utc>::from_timestamp(self.publication_date, 0)
            .map(|dt| dt.with_timezone(tz).date_naive())
    }
}

/// Build a fixed offset from whole hours east of UTC; out-of-range values fall back to UTC.
pub fn offset_from_hours(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.saturating_mul(3600)).unwrap_or_else(|| Utc.fix())
}
