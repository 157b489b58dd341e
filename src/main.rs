//! Command-line entry point for the Etsy SEO scraper
//!
//! One run loads configuration, starts a browser session, scrapes the
//! requested search pages (and product pages with `--detailed`), exports JSON
//! and CSV, and prints a summary of succeeded and skipped items.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use etsy_seo_scraper::records::RunSummary;
use etsy_seo_scraper::scrape::{self, ScrapeRequest};
use etsy_seo_scraper::{BrowserManager, Config, LaunchOptions, ScrapeError, export, load_config, proxy};

#[derive(Parser, Debug)]
#[command(name = "etsy-scraper", version, about = "Scrape Etsy search results and score listing SEO")]
struct Args {
    /// Search query
    #[arg(long)]
    search: String,

    /// Number of search result pages to scrape
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pages: u32,

    /// Visit every product page and compute an SEO analysis
    #[arg(long)]
    detailed: bool,

    /// Run the browser without a window
    #[arg(long, action = ArgAction::Set, default_value_t = true)]
    headless: bool,

    /// Base name of the exported files
    #[arg(long, default_value = "etsy_data")]
    output: String,

    /// Route the session through a proxy from proxies.txt or PROXY_LIST
    #[arg(long)]
    proxy: bool,

    /// YAML configuration file (defaults to ./config.yaml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for exported files (overrides output.data_dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match configure(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(config.output.log_file.as_deref()) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run(&args, &config).await {
        Ok(summary) => {
            println!("{}", summary.render());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Config file values with CLI flags applied on top
fn configure(args: &Args) -> Result<Config, ScrapeError> {
    let mut config = load_config(args.config.as_deref())?;
    config.browser.headless = args.headless;
    if let Some(dir) = &args.output_dir {
        config.output.data_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")
}

async fn run(args: &Args, config: &Config) -> Result<RunSummary, ScrapeError> {
    let proxy = if args.proxy {
        proxy::choose_proxy(&proxy::load_proxies())
    } else {
        None
    };
    if let Some(proxy) = &proxy {
        info!("Using proxy: {}", proxy);
    }

    // Installed before launch so Ctrl-C during download or startup still reaches shutdown
    let (cancel, signal_task) = scrape::cancel_on(tokio::signal::ctrl_c());

    let options = LaunchOptions::from_config(&config.browser, proxy);
    let opened = BrowserManager::open(&options, config.fetch_timeouts()).await;
    let mut manager = match opened {
        Ok(manager) => manager,
        Err(e) => {
            signal_task.abort();
            return Err(e.into());
        }
    };
    if cancel.is_cancelled() {
        signal_task.abort();
        manager.shutdown().await;
        warn!("Interrupted during browser startup; nothing was scraped");
        return Ok(RunSummary {
            interrupted: true,
            ..RunSummary::default()
        });
    }

    let request = ScrapeRequest {
        query: args.search.clone(),
        pages: args.pages,
        detailed: args.detailed,
    };
    let result = scrape::run(&mut manager, &request, config, &cancel).await;

    signal_task.abort();
    manager.shutdown().await;

    if result.records.is_empty() {
        warn!("No records collected for '{}'", request.query);
    }

    let paths = export(&result, &config.output.data_dir, &args.output, &result.metadata.started_at)?;
    println!("{}", result.metadata.describe());
    println!("Saved {} records", paths.record_count);
    println!("  JSON: {}", paths.json_path.display());
    println!("  CSV:  {}", paths.csv_path.display());

    Ok(result.summary)
}
