//! Search results page parsing
//!
//! Cards are located by structure because the result markup has no stable
//! per-listing identifier beyond the link itself.

use chrono::Local;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::records::{BasicRecord, Price};
use crate::site::{self, LISTING_CARD_SELECTOR};

static CARD: Lazy<Selector> = Lazy::new(|| site::selector(LISTING_CARD_SELECTOR));
static LINK: Lazy<Selector> = Lazy::new(|| site::selector("a.listing-link[href]"));
static TITLE: Lazy<Selector> = Lazy::new(|| site::selector("h3.v2-listing-card__title"));
static PRICE_VALUE: Lazy<Selector> = Lazy::new(|| site::selector("span.currency-value"));
static PRICE_SYMBOL: Lazy<Selector> = Lazy::new(|| site::selector("span.currency-symbol"));
static SHOP: Lazy<Selector> = Lazy::new(|| site::selector("p.v2-listing-card__shop"));
static IMAGE: Lazy<Selector> = Lazy::new(|| site::selector("img.wt-width-full"));
static STARS: Lazy<Selector> = Lazy::new(|| site::selector("span.stars-svg[aria-label]"));
static REVIEWS: Lazy<Selector> = Lazy::new(|| site::selector("span.wt-text-caption.wt-text-gray"));

/// A card that could not be turned into a complete record
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedListing {
    /// 1-based index of the card in document order
    pub index: usize,
    pub url: Option<String>,
    pub reason: String,
}

/// All cards of one results page
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    pub records: Vec<BasicRecord>,
    pub rejected: Vec<RejectedListing>,
}

impl ListingPage {
    /// Number of listing containers seen, accepted or not
    pub fn containers(&self) -> usize {
        self.records.len() + self.rejected.len()
    }
}

/// Records of a single results page, positions `1..=N` in document order
///
/// Returns an empty vector when the page has no listing containers.
pub fn extract_listings(markup: &str) -> Vec<BasicRecord> {
    extract_listings_page(markup, 1, 1, None).records
}

/// Parse one results page, numbering accepted records from `first_position`
///
/// `query` is stamped on every accepted record as its `search_query`.
pub fn extract_listings_page(
    markup: &str,
    page_number: u32,
    first_position: u32,
    query: Option<&str>,
) -> ListingPage {
    let document = Html::parse_document(markup);
    let mut page = ListingPage::default();
    let mut position = first_position;

    for (i, card) in document.select(&CARD).enumerate() {
        match parse_card(card, page_number, position, query) {
            Ok(record) => {
                page.records.push(record);
                position += 1;
            }
            Err((url, reason)) => {
                warn!("Rejected listing card {} on page {}: {}", i + 1, page_number, reason);
                page.rejected.push(RejectedListing {
                    index: i + 1,
                    url,
                    reason,
                });
            }
        }
    }

    debug!(
        "Page {}: {} listing containers, {} records",
        page_number,
        page.containers(),
        page.records.len()
    );
    page
}

type CardError = (Option<String>, String);

fn parse_card(
    card: ElementRef<'_>,
    page_number: u32,
    position: u32,
    query: Option<&str>,
) -> Result<BasicRecord, CardError> {
    let product_url = site::select_attr(card, &LINK, "href")
        .and_then(|href| site::absolutize(&href))
        .ok_or((None, "listing link not found".to_string()))?;

    let product_id = site::listing_id(&product_url)
        .ok_or_else(|| (Some(product_url.clone()), "listing id not found in link".to_string()))?;

    let title = site::select_text(card, &TITLE)
        .ok_or_else(|| (Some(product_url.clone()), "title not found".to_string()))?;

    let amount = site::select_text(card, &PRICE_VALUE)
        .and_then(|text| site::parse_amount(&text))
        .ok_or_else(|| (Some(product_url.clone()), "price not found".to_string()))?;
    let symbol = site::select_text(card, &PRICE_SYMBOL).unwrap_or_else(|| "$".to_string());

    let rating = site::select_attr(card, &STARS, "aria-label")
        .and_then(|label| site::first_number(&label))
        .filter(|rating| (0.0..=5.0).contains(rating));

    let review_count = site::select_text(card, &REVIEWS)
        .and_then(|text| site::first_number(&text))
        .map(|count| count.round() as u64);

    Ok(BasicRecord {
        product_id,
        title,
        price: Price {
            amount,
            currency: site::currency_code(&symbol),
        },
        shop_name: site::select_text(card, &SHOP),
        rating,
        review_count,
        image_url: site::select_attr(card, &IMAGE, "src").and_then(|src| site::absolutize(&src)),
        product_url,
        search_position: position,
        search_page: page_number,
        search_query: query.map(str::to_string),
        scraped_at: Local::now(),
    })
}
