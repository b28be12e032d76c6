// src/sink/record.rs
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::news::{NewsItem, Place};

pub const CSV_HEADER: &str =
    "id,date,title,place,description,siteUrl,favoritesCount,commentsCount,rating";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordFormat {
    #[default]
    Jsonl,
    Csv,
}

impl RecordFormat {
    pub fn header(&self) -> Option<&'static str> {
        match self {
            RecordFormat::Jsonl => None,
            RecordFormat::Csv => Some(CSV_HEADER),
        }
    }

    /// One line (without trailing newline) for `item`.
    pub fn encode(&self, item: &NewsItem, tz: &FixedOffset) -> Result<String, serde_json::Error> {
        match self {
            RecordFormat::Jsonl => serde_json::to_string(&StoredItem::from_item(item, tz)),
            RecordFormat::Csv => Ok(csv_row(item, tz)),
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jsonl" | "ndjson" | "json" => Some(RecordFormat::Jsonl),
            "csv" => Some(RecordFormat::Csv),
            _ => None,
        }
    }
}

impl std::str::FromStr for RecordFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| format!("unknown record format: {s}"))
    }
}

/// JSON Lines record: the source fields plus the derived rating and date.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredItem {
    #[serde(flatten)]
    pub item: NewsItem,
    pub rating: f64,
    pub date: Option<NaiveDate>,
}

impl StoredItem {
    pub fn from_item(item: &NewsItem, tz: &FixedOffset) -> Self {
        Self {
            item: item.clone(),
            rating: item.rating(),
            date: item.date(tz),
        }
    }
}

fn csv_row(item: &NewsItem, tz: &FixedOffset) -> String {
    let date = item.date(tz).map(|d| d.to_string()).unwrap_or_default();
    let place = item
        .place
        .map(|Place { id }| id.to_string())
        .unwrap_or_default();
    [
        item.id.to_string(),
        date,
        csv_field(&item.title),
        place,
        csv_field(&item.description),
        csv_field(&item.site_url),
        item.favorites_count.to_string(),
        item.comments_count.to_string(),
        item.rating().to_string(),
    ]
    .join(",")
}

/// Quote a field when it contains a separator, quote, or line break (RFC 4180).
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::offset_from_hours;

    fn item() -> NewsItem {
        NewsItem {
            id: 42,
            publication_date: 1_704_067_200,
            title: "Concert, \"live\"".into(),
            place: Some(Place { id: 9 }),
            description: "line one\nline two".into(),
            site_url: "https://example.test/42".into(),
            favorites_count: 3,
            comments_count: 0,
        }
    }

    #[test]
    fn csv_row_quotes_awkward_fields() {
        let tz = offset_from_hours(0);
        let row = RecordFormat::Csv.encode(&item(), &tz).unwrap();
        assert!(row.starts_with(
            "42,2024-01-01,\"Concert, \"\"live\"\"\",9,\"line one\nline two\","
        ));
        assert!(row.contains(",3,0,"));
        assert_eq!(RecordFormat::Csv.header(), Some(CSV_HEADER));
    }

    #[test]
    fn jsonl_record_carries_derived_fields() {
        let tz = offset_from_hours(3);
        let line = RecordFormat::Jsonl.encode(&item(), &tz).unwrap();
        assert!(!line.contains('\n'));
        let back: StoredItem = serde_json::from_str(&line).unwrap();
        assert_eq!(back.item, item());
        assert_eq!(back.date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!((back.rating - item().rating()).abs() < 1e-12);
    }

    #[test]
    fn format_parses_from_names_and_extensions() {
        assert_eq!("CSV".parse::<RecordFormat>(), Ok(RecordFormat::Csv));
        assert_eq!("ndjson".parse::<RecordFormat>(), Ok(RecordFormat::Jsonl));
        assert!("xml".parse::<RecordFormat>().is_err());
    }
}
