//! report.rs — most-rated selection and the Markdown digest built from a harvest.

use std::fmt::Write as _;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{FixedOffset, NaiveDate};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::news::NewsItem;
use crate::sink::{RecordFormat, StoredItem, CSV_HEADER};

const MAX_DESCRIPTION_CHARS: usize = 1500;

struct Markup {
    tags: Regex,
    whitespace: Regex,
}

fn markup() -> &'static Markup {
    static MARKUP: OnceCell<Markup> = OnceCell::new();
    MARKUP.get_or_init(|| Markup {
        tags: Regex::new(r"(?is)</?[^>]+>").expect("static regex"),
        whitespace: Regex::new(r"\s+").expect("static regex"),
    })
}

fn ascii_quote(c: char) -> char {
    match c {
        '\u{201C}' | '\u{201D}' | '\u{00AB}' | '\u{00BB}' => '"',
        '\u{2018}' | '\u{2019}' => '\'',
        other => other,
    }
}

/// Plain-text form of a KudaGo description: entities decoded, tags dropped (each
/// leaves a space so adjacent paragraphs don't fuse), typographic quotes folded to
/// ASCII, whitespace collapsed, capped at [`MAX_DESCRIPTION_CHARS`] characters.
pub fn normalize_text(s: &str) -> String {
    let m = markup();
    let decoded = html_escape::decode_html_entities(s);
    let untagged = m.tags.replace_all(&decoded, " ");
    let quoted: String = untagged.chars().map(ascii_quote).collect();
    m.whitespace
        .replace_all(&quoted, " ")
        .trim()
        .chars()
        .take(MAX_DESCRIPTION_CHARS)
        .collect()
}

/// Items dated inside `period` (inclusive), best rating first, at most `count`.
pub fn top_rated(
    items: &[NewsItem],
    count: usize,
    period: &RangeInclusive<NaiveDate>,
    tz: &FixedOffset,
) -> Vec<NewsItem> {
    let mut picked: Vec<NewsItem> = items
        .iter()
        .filter(|it| it.date(tz).is_some_and(|d| period.contains(&d)))
        .cloned()
        .collect();
    picked.sort_by(|a, b| b.rating().total_cmp(&a.rating()));
    picked.truncate(count);
    picked
}

/// Markdown digest: one `###` section per item with bold-labelled fields.
pub fn render_markdown(title: &str, items: &[NewsItem], tz: &FixedOffset) -> String {
    let mut out = String::new();
    let _ = write!(out, "# {title}\n\n");

    for it in items {
        let _ = write!(out, "### {}\n\n", it.title.trim());
        let date = it.date(tz).map(|d| d.to_string()).unwrap_or_default();
        let fields = [
            ("Date:", date),
            ("Description:", normalize_text(&it.description)),
            ("Site URL:", it.site_url.clone()),
            ("Favorites Count:", it.favorites_count.to_string()),
            ("Comments Count:", it.comments_count.to_string()),
            ("Rating:", format!("{:.4}", it.rating())),
        ];
        for (label, value) in fields {
            let _ = write!(out, "**{label}** {value}\n\n");
        }
    }
    out
}

/// Write `text` to `path`; an existing file is never overwritten.
pub fn save_report(path: &Path, text: &str) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("report path is empty");
    }
    if path.exists() {
        bail!("report already exists at {}", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating report dir {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("writing report to {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "report saved");
    Ok(())
}

/// Read a JSON Lines harvest back into items. Blank lines are skipped.
///
/// CSV harvests are refused up front, by extension or by their header line.
pub fn load_jsonl(path: &Path) -> Result<Vec<NewsItem>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(RecordFormat::from_extension)
        == Some(RecordFormat::Csv);
    if is_csv {
        bail!("report needs a jsonl harvest, got csv: {}", path.display());
    }
    let content =
        fs::read_to_string(path).with_context(|| format!("reading harvest {}", path.display()))?;
    if content.lines().next().map(str::trim_end) == Some(CSV_HEADER) {
        bail!("report needs a jsonl harvest, {} holds csv records", path.display());
    }
    content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<StoredItem>(line)
                .map(|s| s.item)
                .with_context(|| format!("{}:{}: bad record", path.display(), n + 1))
        })
        .collect()
}
