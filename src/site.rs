//! Site constants and markup helpers shared by the extractors
//!
//! Etsy markup carries no stable per-field identifiers, so every field is
//! located by class names and structure. All selectors live here so a markup
//! change touches one file.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use url::Url;

pub const BASE_URL: &str = "https://www.etsy.com";

/// One product card on a search results page
pub const LISTING_CARD_SELECTOR: &str = "div.wt-grid div.v2-listing-card";

/// Readiness selector for a search results page: a product card, or the
/// empty-results notice so a search with no hits is not a timeout
pub const SEARCH_READY_SELECTOR: &str = "div.wt-grid div.v2-listing-card, \
    [data-search-no-results], div.search-empty-state";

/// Readiness selector for a product page (the title anchor)
pub const DETAIL_READY_SELECTOR: &str = "h1[data-buy-box-listing-title], h1.wt-text-body-01";

/// Breadcrumb entries that name the site itself rather than a category
pub const ROOT_CRUMBS: &[&str] = &["Etsy", "Homepage", "Home"];

/// Parse a built-in selector
///
/// Every selector passed here is a literal from this module and is covered by
/// `all_selectors_parse` below.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("built-in selector {css:?} is invalid: {e}"))
}

static SEARCH_ENDPOINT: Lazy<Url> = Lazy::new(|| {
    Url::parse(&format!("{BASE_URL}/search")).unwrap_or_else(|e| panic!("search endpoint: {e}"))
});

static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,3}(?:,\d{3})+|\d+)(\.\d+)?\s*([kK])?\b").unwrap_or_else(|e| panic!("number pattern: {e}"))
});

/// Build the search URL for one results page
pub fn search_url(query: &str, page: u32) -> Url {
    let mut url = SEARCH_ENDPOINT.clone();
    url.query_pairs_mut()
        .append_pair("q", query)
        .append_pair("page", &page.to_string())
        .append_pair("ref", "pagination");
    url
}

/// Resolve a possibly relative href against the site root
pub fn absolutize(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(href) {
        return Some(url.to_string());
    }
    let path = if href.starts_with('/') {
        href.to_string()
    } else {
        format!("/{href}")
    };
    SEARCH_ENDPOINT.join(&path).ok().map(|url| url.to_string())
}

/// Listing id from a product URL (`.../listing/<id>/<slug>`)
pub fn listing_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("listing/")?;
    let id: String = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_string();
    if id.is_empty() { None } else { Some(id) }
}

/// Concatenated text of an element with whitespace collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-empty text matched by `selector` under `scope`
pub fn select_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

/// First non-empty attribute value matched by `selector` under `scope`
pub fn select_attr(scope: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    scope
        .select(selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

/// First number in free text, honouring thousands separators and a `k` suffix
pub fn first_number(text: &str) -> Option<f64> {
    let caps = NUMBER.captures(text)?;
    let whole = caps.get(1)?.as_str().replace(',', "");
    let fraction = caps.get(2).map(|m| m.as_str()).unwrap_or("");
    let value: f64 = format!("{whole}{fraction}").parse().ok()?;
    if caps.get(3).is_some() {
        Some(value * 1000.0)
    } else {
        Some(value)
    }
}

/// Price text such as `24.99`, `1,234.50`, or `1.234,50`
///
/// A final comma followed by exactly two digits is the decimal separator.
pub fn parse_amount(text: &str) -> Option<f64> {
    let kept: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',')
        .collect();
    let decimal_comma = kept.rfind(',').is_some_and(|i| {
        let tail = &kept[i + 1..];
        tail.len() == 2 && tail.chars().all(|c| c.is_ascii_digit())
    });
    let cleaned: String = if decimal_comma {
        kept.chars()
            .filter(|c| *c != '.')
            .map(|c| if c == ',' { '.' } else { c })
            .collect()
    } else {
        kept.chars().filter(|c| *c != ',').collect()
    };
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Map a displayed currency symbol to its ISO-4217 code
pub fn currency_code(symbol: &str) -> String {
    let symbol = symbol.trim();
    match symbol {
        "" | "$" | "US$" => "USD".to_string(),
        "€" => "EUR".to_string(),
        "£" => "GBP".to_string(),
        "¥" | "JP¥" => "JPY".to_string(),
        "CA$" | "C$" => "CAD".to_string(),
        "A$" | "AU$" => "AUD".to_string(),
        "₹" => "INR".to_string(),
        other if other.len() == 3 && other.chars().all(|c| c.is_ascii_alphabetic()) => {
            other.to_ascii_uppercase()
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn all_selectors_parse() {
        for css in [LISTING_CARD_SELECTOR, SEARCH_READY_SELECTOR, DETAIL_READY_SELECTOR] {
            selector(css);
        }
    }

    #[test]
    fn search_ready_matches_cards_and_empty_results() {
        let ready = selector(SEARCH_READY_SELECTOR);
        let with_cards = Html::parse_document(
            r#"<div class="wt-grid"><div class="v2-listing-card"></div></div>"#,
        );
        let empty = Html::parse_document(
            r#"<div class="search-empty-state"><p>We couldn't find any results</p></div>"#,
        );
        let loading = Html::parse_document(r#"<div class="wt-grid"></div>"#);

        assert!(with_cards.select(&ready).next().is_some());
        assert!(empty.select(&ready).next().is_some());
        assert!(loading.select(&ready).next().is_none());
    }

    #[test]
    fn search_url_encodes_query() {
        let url = search_url("handmade jewelry", 2);
        assert_eq!(
            url.as_str(),
            "https://www.etsy.com/search?q=handmade+jewelry&page=2&ref=pagination"
        );
    }

    #[test]
    fn absolutize_handles_relative_and_absolute() {
        assert_eq!(
            absolutize("/listing/123/ring").as_deref(),
            Some("https://www.etsy.com/listing/123/ring")
        );
        assert_eq!(
            absolutize("listing/123").as_deref(),
            Some("https://www.etsy.com/listing/123")
        );
        assert_eq!(
            absolutize("https://www.etsy.com/listing/9?ref=x").as_deref(),
            Some("https://www.etsy.com/listing/9?ref=x")
        );
        assert_eq!(absolutize("  "), None);
    }

    #[test]
    fn listing_id_from_url() {
        assert_eq!(
            listing_id("https://www.etsy.com/listing/1234567/silver-ring?ref=search").as_deref(),
            Some("1234567")
        );
        assert_eq!(listing_id("https://www.etsy.com/listing/42?x=1").as_deref(), Some("42"));
        assert_eq!(listing_id("https://www.etsy.com/shop/foo"), None);
    }

    #[test]
    fn numbers_in_text() {
        assert_eq!(first_number("4.8 out of 5 stars"), Some(4.8));
        assert_eq!(first_number("(1,204)"), Some(1204.0));
        assert_eq!(first_number("(1.2k)"), Some(1200.0));
        assert_eq!(first_number("no digits"), None);
        assert_eq!(parse_amount("1,234.50"), Some(1234.5));
        assert_eq!(parse_amount("24.99"), Some(24.99));
        assert_eq!(parse_amount("free"), None);
    }

    #[test]
    fn amount_accepts_decimal_comma() {
        assert_eq!(parse_amount("24,99"), Some(24.99));
        assert_eq!(parse_amount("1.234,50 €"), Some(1234.5));
        assert_eq!(parse_amount("1,234"), Some(1234.0));
        assert_eq!(parse_amount("12,345,678"), Some(12_345_678.0));
    }

    #[test]
    fn currency_symbols_map_to_codes() {
        assert_eq!(currency_code("$"), "USD");
        assert_eq!(currency_code("€"), "EUR");
        assert_eq!(currency_code("CA$"), "CAD");
        assert_eq!(currency_code("nzd"), "NZD");
        assert_eq!(currency_code("₩"), "₩");
    }
}
