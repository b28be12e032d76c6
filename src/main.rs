//! news-harvester — binary entrypoint.
//! `harvest` runs the concurrent fetch pipeline into a file; `report` renders the
//! most-rated items of a JSON Lines harvest as Markdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_harvester::config::HarvestConfig;
use news_harvester::ingest::providers::fixture::FixtureTransport;
use news_harvester::ingest::providers::kudago::KudaGoTransport;
use news_harvester::ingest::types::{PageTransport, TracingObserver};
use news_harvester::metrics::Metrics;
use news_harvester::news::offset_from_hours;
use news_harvester::report;
use news_harvester::sink::{FileDestination, RecordFormat};

#[derive(Parser)]
#[command(name = "news-harvester")]
#[command(about = "Fetch paginated news concurrently and write them to a file", long_about = None)]
struct Cli {
    /// Config file (TOML or JSON); defaults to $HARVEST_CONFIG_PATH, then config/harvest.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the fetch pipeline and write every item to the output file
    Harvest(HarvestArgs),
    /// Render the most-rated items of a JSON Lines harvest as Markdown
    Report(ReportArgs),
}

#[derive(Args)]
struct HarvestArgs {
    /// Number of fetch workers
    #[arg(long)]
    workers: Option<u32>,

    /// Maximum requests in flight across all workers
    #[arg(long)]
    max_concurrent: Option<usize>,

    /// Number of pages to fetch
    #[arg(long)]
    pages: Option<u32>,

    /// Items per page (max 100)
    #[arg(long)]
    page_size: Option<u32>,

    /// Output file; must not exist yet
    #[arg(long)]
    output: Option<PathBuf>,

    /// Record format (csv or jsonl); inferred from the output extension if omitted
    #[arg(long)]
    format: Option<RecordFormat>,

    /// Serve pages from page-N.json files in this directory instead of the live API
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Write a Prometheus metrics snapshot here after the run
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

#[derive(Args)]
struct ReportArgs {
    /// JSON Lines harvest to read
    #[arg(long)]
    input: PathBuf,

    /// Markdown file to create; printed to stdout if omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// How many items to keep
    #[arg(long)]
    top: Option<usize>,

    /// First day of the period (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day of the period (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("news_harvester=info,warn"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op otherwise.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let cfg = match &cli.config {
        Some(path) => HarvestConfig::load_from(path)?,
        None => HarvestConfig::load_default()?,
    };

    match cli.command {
        Command::Harvest(args) => harvest(cfg, args).await,
        Command::Report(args) => render_report(cfg, args),
    }
}

async fn harvest(mut cfg: HarvestConfig, args: HarvestArgs) -> Result<()> {
    if let Some(v) = args.workers {
        cfg.workers = v;
    }
    if let Some(v) = args.max_concurrent {
        cfg.max_concurrent = v;
    }
    if let Some(v) = args.pages {
        cfg.total_pages = v;
    }
    if let Some(v) = args.page_size {
        cfg.page_size = v;
    }
    if let Some(v) = args.output {
        cfg.output = v;
    }
    if args.format.is_some() {
        cfg.format = args.format;
    }
    if args.metrics_out.is_some() {
        cfg.metrics_path = args.metrics_out;
    }
    let cfg = cfg.sanitized();

    let metrics = match &cfg.metrics_path {
        Some(_) => Some(Metrics::init()?),
        None => None,
    };

    let transport: Arc<dyn PageTransport> = match &args.fixtures {
        Some(dir) => Arc::new(FixtureTransport::from_dir(dir)?),
        None => Arc::new(KudaGoTransport::new(&cfg.kudago).context("building http client")?),
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping workers");
                cancel.cancel();
            }
        });
    }

    let result = news_harvester::run_pipeline_with_cancel(
        transport,
        Arc::new(TracingObserver),
        Arc::new(FileDestination::new(&cfg.output)),
        cfg.pipeline(),
        cancel,
    )
    .await;

    if let (Some(m), Some(path)) = (&metrics, &cfg.metrics_path) {
        if let Err(e) = m.write_snapshot(path) {
            tracing::warn!(error = ?e, "metrics snapshot not written");
        }
    }

    let summary = result?;
    println!(
        "Harvested {} items from {} pages ({} failed) into {} in {} ms{}",
        summary.written.items,
        summary.pages,
        summary.failed_pages,
        cfg.output.display(),
        summary.elapsed.as_millis(),
        if summary.cancelled { " (interrupted)" } else { "" }
    );
    Ok(())
}

fn render_report(cfg: HarvestConfig, args: ReportArgs) -> Result<()> {
    let mut settings = cfg.report.clone();
    if let Some(v) = args.top {
        settings.top = v;
    }
    if args.from.is_some() {
        settings.from = args.from;
    }
    if args.to.is_some() {
        settings.to = args.to;
    }
    let cfg = HarvestConfig {
        report: settings,
        ..cfg
    }
    .sanitized();

    let tz = offset_from_hours(cfg.utc_offset_hours);
    let today = chrono::Utc::now().with_timezone(&tz).date_naive();
    let period = cfg.report_period(today)?;

    let items = report::load_jsonl(&args.input)?;
    let top = report::top_rated(&items, cfg.report.top, &period, &tz);
    tracing::info!(
        loaded = items.len(),
        kept = top.len(),
        from = %period.start(),
        to = %period.end(),
        "report selection"
    );

    let text = report::render_markdown(&cfg.report.title, &top, &tz);
    match &args.output {
        Some(path) => report::save_report(path, &text)?,
        None => print!("{text}"),
    }
    Ok(())
}
