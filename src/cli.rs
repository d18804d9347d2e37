use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use crate::archiver;
use crate::config::{self, FetchSettings, StoreSet};
use crate::demo;
use crate::fetcher::HttpSource;
use crate::pipeline::{self, RunStats};

/// Collect Walmart clearance listings for Saint-Jérôme and Blainville.
#[derive(Debug, Parser)]
#[command(name = "walmart-liquidations", version)]
pub struct Cli {
    /// JSON file to produce. Without it, `--demo` prints to stdout.
    #[arg(long, env = "LIQUIDATIONS_OUTPUT", required_unless_present = "demo")]
    pub output: Option<PathBuf>,

    /// Write the built-in demo listings without any HTTP request.
    #[arg(long)]
    pub demo: bool,

    /// Search terms sent to the catalog endpoint.
    #[arg(long, default_value = config::DEFAULT_QUERY)]
    pub query: String,

    /// Pause between page requests, in seconds.
    #[arg(long, default_value = "1.5", value_parser = parse_seconds)]
    pub delay: Duration,

    /// Maximum pages fetched per store.
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_pages: u32,

    /// Listings requested per page.
    #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(u32).range(1..))]
    pub page_size: u32,

    /// Per-request timeout, in seconds.
    #[arg(long, default_value = "20", value_parser = parse_seconds)]
    pub timeout: Duration,

    /// Extra attempts after a transient failure (network error, 429, 5xx).
    #[arg(long, default_value_t = 2)]
    pub retries: u32,

    /// Base backoff before a retry, in seconds; doubles on each attempt.
    #[arg(long, default_value = "1", value_parser = parse_seconds)]
    pub backoff: Duration,

    /// Only scrape these store slugs.
    #[arg(long, num_args = 1..)]
    pub stores: Vec<String>,

    /// YAML file replacing the built-in store list.
    #[arg(long)]
    pub stores_file: Option<PathBuf>,

    #[arg(long, default_value = config::DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Origin used to absolutize relative product links.
    #[arg(long, default_value = config::DEFAULT_SITE_URL)]
    pub site_url: String,

    /// Log filter used when RUST_LOG is unset (e.g. `debug`).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Exit with status 2 when no listing was collected.
    #[arg(long)]
    pub fail_on_empty: bool,
}

fn parse_seconds(text: &str) -> Result<Duration, String> {
    let secs: f64 = text
        .parse()
        .map_err(|_| format!("`{text}` is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("`{text}` must be a finite, non-negative duration"))
}

impl Cli {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            endpoint: self.endpoint.clone(),
            site_url: self.site_url.clone(),
            query: self.query.clone(),
            page_size: self.page_size,
            max_pages: self.max_pages,
            delay: self.delay,
            timeout: self.timeout,
            max_retries: self.retries,
            backoff_base: self.backoff,
            ..FetchSettings::default()
        }
    }

    pub fn store_set(&self) -> anyhow::Result<StoreSet> {
        let set = match &self.stores_file {
            Some(path) => StoreSet::load(path)?,
            None => StoreSet::default(),
        };
        Ok(set.select(&self.stores)?)
    }
}

/// What a finished run produced.
#[derive(Debug)]
pub struct RunSummary {
    pub items: usize,
    pub stats: RunStats,
}

/// Runs the whole pipeline for parsed flags. Only configuration and write
/// failures are returned as errors.
pub fn run(cli: &Cli) -> anyhow::Result<RunSummary> {
    let stores = cli.store_set().context("loading store configuration")?;

    let (document, stats) = if cli.demo {
        tracing::info!(stores = stores.len(), "demo mode, skipping HTTP");
        (demo::document(&stores, &cli.query), RunStats::default())
    } else {
        let settings = cli.fetch_settings();
        let source = HttpSource::new(&settings).context("building HTTP client")?;
        let collected = pipeline::scrape(&source, &stores, &settings);
        (collected.document, collected.stats)
    };

    match &cli.output {
        Some(path) => archiver::save_to_file(&document, path)
            .with_context(|| format!("saving {}", path.display()))?,
        None => archiver::write_to(&document, io::stdout().lock()).context("printing output")?,
    }

    let items = document.items.len();
    if items == 0 {
        tracing::warn!("no listings collected, check the parameters or retry later");
    }
    tracing::info!(
        items,
        duplicates = stats.duplicates,
        skipped = stats.entries_skipped,
        failed_stores = stats.failed_stores.len(),
        "run finished"
    );

    Ok(RunSummary { items, stats })
}
