// src/config/harvest.rs
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ingest::providers::kudago::KudaGoSettings;
use crate::ingest::PipelineConfig;
use crate::news::offset_from_hours;
use crate::sink::RecordFormat;

pub const ENV_CONFIG_PATH: &str = "HARVEST_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/harvest.toml";
pub const DEFAULT_JSON_PATH: &str = "config/harvest.json";

const MAX_PAGE_SIZE: u32 = 100;
const MAX_WORKERS: u32 = 256;
const MAX_CONCURRENT: usize = 256;

fn default_workers() -> u32 {
    4
}
fn default_max_concurrent() -> usize {
    5
}
fn default_total_pages() -> u32 {
    10
}
fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}
fn default_output() -> PathBuf {
    PathBuf::from("news/news.jsonl")
}
fn default_utc_offset_hours() -> i32 {
    3
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestConfig {
    #[serde(default = "default_workers")]
    pub workers: u32,
    /// Global cap on in-flight requests, independent of `workers`.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_total_pages")]
    pub total_pages: u32,
    /// The API caps page_size at 100.
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    /// Inferred from the output extension when absent.
    #[serde(default)]
    pub format: Option<RecordFormat>,
    /// Fixed zone used for calendar dates.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// Prometheus exposition text is written here after a run, if set.
    #[serde(default)]
    pub metrics_path: Option<PathBuf>,
    #[serde(default)]
    pub kudago: KudaGoSettings,
    #[serde(default)]
    pub report: ReportSettings,
}

fn default_report_title() -> String {
    "Most Rated News".to_string()
}
fn default_report_top() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_report_title")]
    pub title: String,
    #[serde(default = "default_report_top")]
    pub top: usize,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            title: default_report_title(),
            top: default_report_top(),
            from: None,
            to: None,
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_concurrent: default_max_concurrent(),
            total_pages: default_total_pages(),
            page_size: default_page_size(),
            output: default_output(),
            format: None,
            utc_offset_hours: default_utc_offset_hours(),
            metrics_path: None,
            kudago: KudaGoSettings::default(),
            report: ReportSettings::default(),
        }
    }
}

impl HarvestConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading harvest config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: HarvestConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?,
            _ => toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?,
        };
        Ok(cfg.sanitized())
    }

    /// Load using env var + fallbacks:
    /// 1) $HARVEST_CONFIG_PATH
    /// 2) config/harvest.toml
    /// 3) config/harvest.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    /// Clamp values into ranges the pipeline accepts.
    pub fn sanitized(mut self) -> Self {
        self.workers = self.workers.clamp(1, MAX_WORKERS);
        self.max_concurrent = self.max_concurrent.clamp(1, MAX_CONCURRENT);
        self.page_size = self.page_size.clamp(1, MAX_PAGE_SIZE);
        if !(-12..=14).contains(&self.utc_offset_hours) {
            self.utc_offset_hours = default_utc_offset_hours();
        }
        if let (Some(from), Some(to)) = (self.report.from, self.report.to) {
            if from > to {
                // swap to keep a valid interval
                self.report.from = Some(to);
                self.report.to = Some(from);
            }
        }
        self
    }

    /// Explicit format, else the output extension, else JSON Lines.
    pub fn record_format(&self) -> RecordFormat {
        self.format
            .or_else(|| {
                self.output
                    .extension()
                    .and_then(|e| e.to_str())
                    .and_then(RecordFormat::from_extension)
            })
            .unwrap_or_default()
    }

    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers,
            max_concurrent: self.max_concurrent,
            total_pages: self.total_pages,
            page_size: self.page_size,
            format: self.record_format(),
            tz: offset_from_hours(self.utc_offset_hours),
        }
    }

    /// Report period; defaults to the calendar year of `today`.
    pub fn report_period(&self, today: NaiveDate) -> Result<std::ops::RangeInclusive<NaiveDate>> {
        use chrono::Datelike;
        let year_start = NaiveDate::from_ymd_opt(today.year(), 1, 1);
        let year_end = NaiveDate::from_ymd_opt(today.year(), 12, 31);
        let (Some(from), Some(to)) = (
            self.report.from.or(year_start),
            self.report.to.or(year_end),
        ) else {
            bail!("cannot derive report period for {today}");
        };
        Ok(from..=to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: HarvestConfig = toml::from_str(
            r#"
workers = 8
output = "out/news.csv"

[kudago]
location = "msk"
"#,
        )
        .unwrap();
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.max_concurrent, 5);
        assert_eq!(cfg.kudago.location, "msk");
        assert_eq!(cfg.kudago.base_url, "https://kudago.com");
        assert_eq!(cfg.record_format(), RecordFormat::Csv);
    }

    #[test]
    fn sanitize_clamps_ranges() {
        let cfg = HarvestConfig {
            workers: 0,
            max_concurrent: 0,
            page_size: 1_000,
            utc_offset_hours: 99,
            report: ReportSettings {
                from: NaiveDate::from_ymd_opt(2024, 12, 31),
                to: NaiveDate::from_ymd_opt(2024, 1, 1),
                ..ReportSettings::default()
            },
            ..HarvestConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.workers, 1);
        assert_eq!(cfg.max_concurrent, 1);
        assert_eq!(cfg.page_size, 100);
        assert_eq!(cfg.utc_offset_hours, 3);
        assert!(cfg.report.from < cfg.report.to);
        assert!(cfg.pipeline().validate().is_ok());
    }

    #[test]
    fn sanitize_caps_oversized_concurrency() {
        let cfg = HarvestConfig {
            workers: u32::MAX,
            max_concurrent: usize::MAX,
            ..HarvestConfig::default()
        }
        .sanitized();
        assert_eq!(cfg.workers, MAX_WORKERS);
        assert_eq!(cfg.max_concurrent, MAX_CONCURRENT);
        assert!(cfg.pipeline().validate().is_ok());
        assert!(crate::ingest::limiter::ConcurrencyLimiter::new(cfg.max_concurrent).is_ok());
    }

    #[test]
    fn report_period_defaults_to_current_year() {
        let cfg = HarvestConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        let p = cfg.report_period(today).unwrap();
        assert_eq!(*p.start(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(*p.end(), NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        // Isolate CWD so a real config/ in the repo does not leak in
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        assert_eq!(HarvestConfig::load_default().unwrap(), HarvestConfig::default());

        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(tmp.path().join(DEFAULT_TOML_PATH), "total_pages = 3").unwrap();
        assert_eq!(HarvestConfig::load_default().unwrap().total_pages, 3);

        let p_json = tmp.path().join("harvest.json");
        fs::write(&p_json, r#"{"total_pages": 7, "format": "csv"}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p_json.display().to_string());
        let cfg = HarvestConfig::load_default().unwrap();
        assert_eq!(cfg.total_pages, 7);
        assert_eq!(cfg.format, Some(RecordFormat::Csv));

        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml"));
        assert!(HarvestConfig::load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
