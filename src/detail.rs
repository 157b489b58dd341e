//! Product page parsing
//!
//! Combines a freshly fetched product page with the [`BasicRecord`] it was
//! reached from. The base record is copied through untouched.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;

use crate::records::{BasicRecord, DetailRecord, ShippingInfo};
use crate::site::{self, DETAIL_READY_SELECTOR, ROOT_CRUMBS};

static TITLE_ANCHOR: Lazy<Selector> = Lazy::new(|| site::selector(DETAIL_READY_SELECTOR));
static CANONICAL: Lazy<Selector> = Lazy::new(|| site::selector("link[rel='canonical'][href]"));
static DESCRIPTION: Lazy<Selector> = Lazy::new(|| {
    site::selector(
        "div[data-id='description-text'], #description-text, \
         p[data-product-details-description-text-content]",
    )
});
static TAG_LINKS: Lazy<Selector> = Lazy::new(|| {
    site::selector("div[data-selector='listing-page-attributes'] a[href^='/search?q=']")
});
static META_KEYWORDS: Lazy<Selector> = Lazy::new(|| site::selector("meta[name='keywords'][content]"));
static BREADCRUMBS: Lazy<Selector> =
    Lazy::new(|| site::selector("ul.wt-breadcrumbs li a, nav[aria-label='Breadcrumb'] a"));
static SHOP_LINK: Lazy<Selector> = Lazy::new(|| site::selector("a.wt-text-link-no-underline[href]"));
static CAROUSEL_IMAGES: Lazy<Selector> =
    Lazy::new(|| site::selector("div.listing-page-image-carousel-component ul li img"));
static SHIPPING: Lazy<Selector> = Lazy::new(|| {
    site::selector("div.wt-text-caption.shipping-costs, [data-estimated-shipping]")
});

/// Thumbnail size segment in image CDN URLs, e.g. `il_75x75`
static THUMB_SIZE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"il_\d+x\d+").unwrap_or_else(|e| panic!("thumbnail pattern: {e}")));

const TAG_SEPARATOR: char = ',';

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetailParseError {
    #[error("Title anchor not found on product page: {url}")]
    MissingAnchor { url: String },

    #[error("Product page {url} belongs to listing {found}, expected {expected}")]
    ListingMismatch {
        url: String,
        expected: String,
        found: String,
    },
}

impl DetailParseError {
    pub fn url(&self) -> &str {
        match self {
            DetailParseError::MissingAnchor { url } | DetailParseError::ListingMismatch { url, .. } => url,
        }
    }
}

/// Build the extended record for `base` from its product page markup
///
/// # Errors
/// [`DetailParseError`] when the page lacks the title anchor or its canonical
/// link points at another listing (for example after a redirect).
pub fn extract_detail(markup: &str, base: &BasicRecord) -> Result<DetailRecord, DetailParseError> {
    let document = Html::parse_document(markup);
    let root = document.root_element();

    if site::select_text(root, &TITLE_ANCHOR).is_none() {
        return Err(DetailParseError::MissingAnchor {
            url: base.product_url.clone(),
        });
    }

    if let Some(found) = site::select_attr(root, &CANONICAL, "href").and_then(|href| site::listing_id(&href))
        && found != base.product_id
    {
        return Err(DetailParseError::ListingMismatch {
            url: base.product_url.clone(),
            expected: base.product_id.clone(),
            found,
        });
    }

    Ok(DetailRecord {
        base: base.clone(),
        description: site::select_text(root, &DESCRIPTION),
        tags: extract_tags(&document),
        categories: extract_categories(&document),
        shop_url: site::select_attr(root, &SHOP_LINK, "href").and_then(|href| site::absolutize(&href)),
        image_urls: extract_images(&document),
        shipping_info: site::select_text(root, &SHIPPING).map(|text| ShippingInfo {
            cost: site::first_number(&text),
            text,
        }),
    })
}

fn extract_tags(document: &Html) -> Vec<String> {
    let tags: Vec<String> = document
        .select(&TAG_LINKS)
        .map(site::element_text)
        .filter(|tag| !tag.is_empty())
        .collect();
    if !tags.is_empty() {
        return tags;
    }

    site::select_attr(document.root_element(), &META_KEYWORDS, "content")
        .map(|content| {
            content
                .split(TAG_SEPARATOR)
                .map(site::normalize_whitespace)
                .filter(|tag| !tag.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn extract_categories(document: &Html) -> Vec<String> {
    document
        .select(&BREADCRUMBS)
        .map(site::element_text)
        .filter(|crumb| !crumb.is_empty() && !ROOT_CRUMBS.contains(&crumb.as_str()))
        .collect()
}

fn extract_images(document: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .select(&CAROUSEL_IMAGES)
        .filter_map(|img| {
            let value = img.value();
            value.attr("src").filter(|src| !src.trim().is_empty()).or_else(|| value.attr("data-src"))
        })
        .filter_map(site::absolutize)
        .map(|src| THUMB_SIZE.replace(&src, "il_fullxfull").into_owned())
        .filter(|src| seen.insert(src.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::basic_record;

    const PRODUCT_PAGE: &str = r#"<html><head>
        <link rel="canonical" href="https://www.etsy.com/listing/101/handmade-silver-ring">
        </head><body>
        <ul class="wt-breadcrumbs">
          <li><a href="/">Etsy</a></li>
          <li><a href="/c/jewelry">Jewelry</a></li>
          <li><a href="/c/jewelry/rings">Rings</a></li>
          <li><a href="/c/jewelry/rings/bands">Bands</a></li>
        </ul>
        <div class="listing-page-image-carousel-component"><ul>
          <li><img src="https://i.etsystatic.com/1/il_75x75.a.jpg"></li>
          <li><img src="https://i.etsystatic.com/1/il_fullxfull.a.jpg"></li>
          <li><img data-src="https://i.etsystatic.com/1/il_75x75.b.jpg"></li>
        </ul></div>
        <h1 class="wt-text-body-01" data-buy-box-listing-title="true">Sterling Silver Ring (page wording)</h1>
        <a class="wt-text-link-no-underline" href="/shop/SilverCraftCo"><span class="wt-text-body-01">SilverCraftCo</span></a>
        <div data-id="description-text">  Polished
           sterling silver band.  </div>
        <div data-selector="listing-page-attributes">
          <a href="/search?q=silver+ring">silver ring</a>
          <a href="/search?q=stacking">stacking</a>
          <a href="/search?q=gift">gift</a>
        </div>
        <div class="wt-text-caption shipping-costs">Shipping: $4.50 to United States</div>
        </body></html>"#;

    #[test]
    fn extracts_all_fields() {
        let base = basic_record(1);
        let detail = extract_detail(PRODUCT_PAGE, &base).unwrap();

        assert_eq!(detail.description.as_deref(), Some("Polished sterling silver band."));
        assert_eq!(detail.tags, vec!["silver ring", "stacking", "gift"]);
        assert_eq!(detail.categories, vec!["Jewelry", "Rings", "Bands"]);
        assert_eq!(detail.shop_url.as_deref(), Some("https://www.etsy.com/shop/SilverCraftCo"));
        assert_eq!(
            detail.image_urls,
            vec![
                "https://i.etsystatic.com/1/il_fullxfull.a.jpg",
                "https://i.etsystatic.com/1/il_fullxfull.b.jpg",
            ]
        );
        let shipping = detail.shipping_info.unwrap();
        assert_eq!(shipping.text, "Shipping: $4.50 to United States");
        assert_eq!(shipping.cost, Some(4.5));
    }

    #[test]
    fn base_fields_pass_through_unchanged() {
        let base = basic_record(1);
        let detail = extract_detail(PRODUCT_PAGE, &base).unwrap();
        assert_eq!(detail.base, base);
        assert_eq!(detail.base.title, "Handmade Silver Ring");
    }

    #[test]
    fn missing_tag_list_yields_empty_tags() {
        let markup = PRODUCT_PAGE.replace("listing-page-attributes", "something-else");
        let detail = extract_detail(&markup, &basic_record(1)).unwrap();
        assert!(detail.tags.is_empty());
    }

    #[test]
    fn meta_keywords_fall_back_as_tags() {
        let markup = PRODUCT_PAGE
            .replace("listing-page-attributes", "something-else")
            .replace("</head>", r#"<meta name="keywords" content="silver, ring , ,band"></head>"#);
        let detail = extract_detail(&markup, &basic_record(1)).unwrap();
        assert_eq!(detail.tags, vec!["silver", "ring", "band"]);
    }

    #[test]
    fn missing_anchor_is_an_error_with_url() {
        let markup = PRODUCT_PAGE.replace("<h1", "<h2").replace("</h1>", "</h2>");
        let base = basic_record(1);
        let err = extract_detail(&markup, &base).unwrap_err();
        assert_eq!(
            err,
            DetailParseError::MissingAnchor {
                url: base.product_url.clone()
            }
        );
        assert_eq!(err.url(), base.product_url);
    }

    #[test]
    fn redirected_page_is_rejected() {
        let markup = PRODUCT_PAGE.replace("/listing/101/", "/listing/999/");
        let err = extract_detail(&markup, &basic_record(1)).unwrap_err();
        assert!(matches!(
            err,
            DetailParseError::ListingMismatch { ref found, .. } if found == "999"
        ));
    }

    #[test]
    fn sparse_page_keeps_optional_fields_absent() {
        let markup = r#"<html><body><h1 class="wt-text-body-01">Ring</h1></body></html>"#;
        let detail = extract_detail(markup, &basic_record(1)).unwrap();
        assert_eq!(detail.description, None);
        assert_eq!(detail.shop_url, None);
        assert_eq!(detail.shipping_info, None);
        assert!(detail.categories.is_empty());
        assert!(detail.image_urls.is_empty());
    }
}
