//! Sequential scrape pipeline
//!
//! Search pages are fetched one after another, then (in detailed mode) every
//! product page. Fetch and parse failures are recorded in the run summary and
//! the run moves on; nothing here is fatal. Each item is attempted once.

use chrono::Local;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Config;
use crate::detail::extract_detail;
use crate::fetcher::PageFetcher;
use crate::listing::extract_listings_page;
use crate::records::{
    BasicRecord, DetailedRecord, ItemKind, RunMetadata, RunResult, RunSummary, ScrapedRecord,
};
use crate::seo::SeoScorer;
use crate::site::{self, DETAIL_READY_SELECTOR, SEARCH_READY_SELECTOR};

/// What one invocation asked for
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapeRequest {
    pub query: String,
    pub pages: u32,
    pub detailed: bool,
}

/// Token cancelled once `signal` completes, plus the task waiting for it
///
/// Abort the returned task when the run is over.
pub fn cancel_on<S>(signal: S) -> (CancellationToken, JoinHandle<()>)
where
    S: Future + Send + 'static,
{
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let task = tokio::spawn(async move {
        signal.await;
        warn!("Interrupted, finishing with the records collected so far");
        interrupt.cancel();
    });
    (cancel, task)
}

/// Run `fut` unless `cancel` fires first
async fn unless_cancelled<T>(cancel: &CancellationToken, fut: impl Future<Output = T>) -> Option<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Fetch the requested search pages and return their records in fetch order
///
/// Positions continue across pages. A page that loads but has no listing
/// containers ends pagination.
pub async fn search_products<F>(
    fetcher: &mut F,
    request: &ScrapeRequest,
    config: &Config,
    summary: &mut RunSummary,
    cancel: &CancellationToken,
) -> Vec<BasicRecord>
where
    F: PageFetcher + ?Sized,
{
    info!("Searching for '{}' (up to {} pages)", request.query, request.pages);
    let mut records: Vec<BasicRecord> = Vec::new();

    for page_number in 1..=request.pages {
        if page_number > 1 {
            let delay = config.crawl.page_delay.sample();
            debug!("Sleeping for {:.2} seconds", delay.as_secs_f64());
            if unless_cancelled(cancel, tokio::time::sleep(delay)).await.is_none() {
                summary.interrupted = true;
                break;
            }
        }

        let url = site::search_url(&request.query, page_number).to_string();
        info!("Scraping page {} of {}", page_number, request.pages);

        let fetched = unless_cancelled(cancel, fetcher.fetch(&url, SEARCH_READY_SELECTOR)).await;
        let markup = match fetched {
            None => {
                summary.interrupted = true;
                break;
            }
            Some(Ok(markup)) => markup,
            Some(Err(e)) => {
                warn!("Skipping search page {}: {}", page_number, e);
                summary.skip(ItemKind::SearchPage, url, e.to_string());
                continue;
            }
        };
        summary.pages_succeeded += 1;

        let first_position = records.len() as u32 + 1;
        let page = extract_listings_page(&markup, page_number, first_position, Some(&request.query));
        for rejected in &page.rejected {
            let item_url = rejected
                .url
                .clone()
                .unwrap_or_else(|| format!("{url}#listing-{}", rejected.index));
            summary.skip(ItemKind::Listing, item_url, rejected.reason.clone());
        }

        if page.containers() == 0 {
            warn!("No products found on page {}. Stopping search.", page_number);
            break;
        }

        info!("Found {} products on page {}", page.records.len(), page_number);
        records.extend(page.records);
    }

    info!("Total products found: {}", records.len());
    records
}

/// Visit each product page, extract its details, and score it
///
/// Records whose page fails to load or parse are dropped and recorded in
/// `summary`. When cancelled, the records not yet visited are kept as basic
/// records.
pub async fn enrich_products<F>(
    fetcher: &mut F,
    records: Vec<BasicRecord>,
    scorer: &SeoScorer,
    config: &Config,
    summary: &mut RunSummary,
    cancel: &CancellationToken,
) -> Vec<ScrapedRecord>
where
    F: PageFetcher + ?Sized,
{
    info!("Scraping detailed product information...");
    let total = records.len();
    let mut enriched = Vec::with_capacity(total);
    let mut pending = records.into_iter().enumerate();

    while let Some((i, record)) = pending.next() {
        if i > 0 {
            let delay = config.crawl.detail_delay.sample();
            if unless_cancelled(cancel, tokio::time::sleep(delay)).await.is_none() {
                summary.interrupted = true;
                enriched.push(ScrapedRecord::Basic(record));
                break;
            }
        }

        info!("Scraping details for product {} of {}: {}", i + 1, total, record.product_url);
        let fetched = unless_cancelled(cancel, fetcher.fetch(&record.product_url, DETAIL_READY_SELECTOR)).await;
        let markup = match fetched {
            None => {
                summary.interrupted = true;
                enriched.push(ScrapedRecord::Basic(record));
                break;
            }
            Some(Ok(markup)) => markup,
            Some(Err(e)) => {
                warn!("Skipping product page {}: {}", record.product_url, e);
                summary.skip(ItemKind::Detail, record.product_url.clone(), e.to_string());
                continue;
            }
        };

        match extract_detail(&markup, &record) {
            Ok(detail) => {
                let seo_analysis = scorer.score(&detail);
                debug!("SEO score for {}: {}", detail.base.product_id, seo_analysis.seo_score);
                enriched.push(ScrapedRecord::Detailed(Box::new(DetailedRecord {
                    detail,
                    seo_analysis,
                })));
            }
            Err(e) => {
                warn!("Skipping product page {}: {}", e.url(), e);
                summary.skip(ItemKind::Detail, e.url().to_string(), e.to_string());
            }
        }
    }

    if summary.interrupted {
        let kept: Vec<ScrapedRecord> = pending.map(|(_, record)| ScrapedRecord::Basic(record)).collect();
        if !kept.is_empty() {
            info!("Interrupted: keeping {} unvisited records without details", kept.len());
        }
        enriched.extend(kept);
    }
    enriched
}

/// Run the whole pipeline against `fetcher`
pub async fn run<F>(
    fetcher: &mut F,
    request: &ScrapeRequest,
    config: &Config,
    cancel: &CancellationToken,
) -> RunResult
where
    F: PageFetcher + ?Sized,
{
    let metadata = RunMetadata {
        started_at: Local::now(),
        query: request.query.clone(),
        pages_requested: request.pages,
        detailed: request.detailed,
    };
    let mut summary = RunSummary::default();

    let basics = search_products(fetcher, request, config, &mut summary, cancel).await;

    let records = if request.detailed && !summary.interrupted {
        let scorer = SeoScorer::new(config.seo.clone(), &request.query);
        enrich_products(fetcher, basics, &scorer, config, &mut summary, cancel).await
    } else {
        basics.into_iter().map(ScrapedRecord::Basic).collect()
    };

    summary.records_succeeded = records.len();
    RunResult {
        metadata,
        records,
        summary,
    }
}
