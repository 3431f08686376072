//! Paper Scrape - Entry Point
//!
//! Reads one record (or an array of records) as JSON, enriches it from the
//! configured sources and prints the result.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use paper_scrape::config::DEFAULT_ORDER;
use paper_scrape::{
    Config, EnrichmentReport, HttpTransport, PaperRecord, ScrapeContext, ScraperPreferences,
    ScraperRegistry, TracingSink,
};

#[derive(Parser, Debug)]
#[command(name = "paper-scrape")]
#[command(about = "Enrich bibliographic records from DBLP and DOI metadata")]
#[command(version)]
struct Cli {
    /// JSON file holding a record or an array of records ("-" for stdin)
    record: PathBuf,

    /// Preferences file (JSON)
    #[arg(long, env = "PAPER_SCRAPE_PREFS")]
    prefs: Option<PathBuf>,

    /// Sources to run, in order
    #[arg(long, value_delimiter = ',')]
    order: Option<Vec<String>>,

    /// Run sources even when gating would skip them
    #[arg(long)]
    force: bool,

    /// Records enriched concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

#[derive(Debug, Serialize)]
struct Enriched {
    record: PaperRecord,
    report: EnrichmentReport,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    // Logs go to stderr; stdout carries the enriched records.
    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr)).init();
    }
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

/// Parse either a single record or an array of records.
fn parse_records(text: &str) -> anyhow::Result<(Vec<PaperRecord>, bool)> {
    let value: serde_json::Value = serde_json::from_str(text).context("input is not JSON")?;
    if value.is_array() {
        Ok((serde_json::from_value(value)?, true))
    } else {
        Ok((vec![serde_json::from_value(value)?], false))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting paper-scrape");

    let mut config = Config::from_env()?;
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency.max(1);
    }

    let preferences = match &cli.prefs {
        Some(path) => ScraperPreferences::from_file(path)
            .with_context(|| format!("loading preferences from {}", path.display()))?,
        None => ScraperPreferences::new(),
    };

    let ctx = ScrapeContext::new(Arc::new(HttpTransport::new(&config)?))
        .with_preferences(Arc::new(preferences))
        .with_log(Arc::new(TracingSink));
    let registry = ScraperRegistry::with_builtin(&config);

    let order: Vec<String> = cli
        .order
        .unwrap_or_else(|| DEFAULT_ORDER.iter().map(ToString::to_string).collect());

    let (records, many) = parse_records(&read_input(&cli.record)?)?;
    tracing::info!(records = records.len(), sources = ?order, "Enriching");

    let results: Vec<Enriched> = registry
        .enrich_all(&ctx, records, &order, cli.force, config.concurrency)
        .await
        .into_iter()
        .map(|(record, report)| Enriched { record, report })
        .collect();

    let output = if many {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string_pretty(&results.first())?
    };
    println!("{output}");

    Ok(())
}
