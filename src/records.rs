//! Record types produced by the scrape pipeline
//!
//! Records are built once by an extractor and never mutated afterwards. The
//! only enrichment step wraps a [`BasicRecord`] into a [`DetailRecord`] and
//! attaches its [`SeoAnalysis`].

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::seo::SeoAnalysis;

/// Listing price as shown on the site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    /// ISO-4217 code when the symbol is recognised, otherwise the raw symbol
    pub currency: String,
}

/// One product card from a search results page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicRecord {
    pub product_id: String,
    pub title: String,
    pub price: Price,
    pub shop_name: Option<String>,
    /// Star rating in 0..=5, `None` when the card shows no rating
    pub rating: Option<f64>,
    /// `None` when the review count was not found, which is not the same as zero reviews
    pub review_count: Option<u64>,
    pub product_url: String,
    pub image_url: Option<String>,
    /// 1-based position across the whole run, in fetch order
    pub search_position: u32,
    pub search_page: u32,
    /// Query the record was found with, `None` for a standalone page parse
    #[serde(default)]
    pub search_query: Option<String>,
    pub scraped_at: DateTime<Local>,
}

/// Free-form shipping block from a detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub text: String,
    pub cost: Option<f64>,
}

/// A [`BasicRecord`] enriched with the product's own page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailRecord {
    #[serde(flatten)]
    pub base: BasicRecord,
    pub description: Option<String>,
    pub tags: Vec<String>,
    /// Breadcrumb path, root first
    pub categories: Vec<String>,
    pub shop_url: Option<String>,
    pub image_urls: Vec<String>,
    pub shipping_info: Option<ShippingInfo>,
}

/// Detail record plus its SEO analysis, as exported in detailed mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedRecord {
    #[serde(flatten)]
    pub detail: DetailRecord,
    pub seo_analysis: SeoAnalysis,
}

/// Either shape of exported record
///
/// `Detailed` comes first so untagged deserialization does not match a
/// detailed object as `Basic` and silently drop its extra fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrapedRecord {
    Detailed(Box<DetailedRecord>),
    Basic(BasicRecord),
}

impl ScrapedRecord {
    pub fn basic(&self) -> &BasicRecord {
        match self {
            ScrapedRecord::Detailed(record) => &record.detail.base,
            ScrapedRecord::Basic(record) => record,
        }
    }
}

/// Which part of the run an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    SearchPage,
    Listing,
    Detail,
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ItemKind::SearchPage => "search page",
            ItemKind::Listing => "listing",
            ItemKind::Detail => "detail page",
        };
        f.write_str(label)
    }
}

/// An item that was attempted once and dropped
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub kind: ItemKind,
    pub url: String,
    pub reason: String,
}

/// Outcome counts for the end-of-run report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub pages_succeeded: usize,
    pub records_succeeded: usize,
    pub skipped: Vec<SkippedItem>,
    /// Set when Ctrl-C stopped the run early
    pub interrupted: bool,
}

impl RunSummary {
    pub fn skip(&mut self, kind: ItemKind, url: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedItem {
            kind,
            url: url.into(),
            reason: reason.into(),
        });
    }

    pub fn skipped_of(&self, kind: ItemKind) -> usize {
        self.skipped.iter().filter(|item| item.kind == kind).count()
    }

    /// Human-readable report printed at the end of a run
    pub fn render(&self) -> String {
        let mut out = format!(
            "✓ Scrape finished{}\n\n  Pages ok: {}\n  Records ok: {}\n  Skipped: {}",
            if self.interrupted { " (interrupted)" } else { "" },
            self.pages_succeeded,
            self.records_succeeded,
            self.skipped.len()
        );
        for item in &self.skipped {
            out.push_str(&format!("\n    - {} {}: {}", item.kind, item.url, item.reason));
        }
        out
    }
}

/// Run-level facts recorded next to the records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Local>,
    pub query: String,
    pub pages_requested: u32,
    pub detailed: bool,
}

impl RunMetadata {
    /// One-line description for the end-of-run report
    pub fn describe(&self) -> String {
        format!(
            "Query '{}', {} page{} requested, {} mode, started {}",
            self.query,
            self.pages_requested,
            if self.pages_requested == 1 { "" } else { "s" },
            if self.detailed { "detailed" } else { "basic" },
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

/// Everything one invocation produced
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub metadata: RunMetadata,
    pub records: Vec<ScrapedRecord>,
    pub summary: RunSummary,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn basic_record(position: u32) -> BasicRecord {
        BasicRecord {
            product_id: format!("10{position}"),
            title: "Handmade Silver Ring".to_string(),
            price: Price {
                amount: 24.99,
                currency: "USD".to_string(),
            },
            shop_name: Some("SilverCraftCo".to_string()),
            rating: Some(4.8),
            review_count: Some(120),
            product_url: format!("https://www.etsy.com/listing/10{position}/handmade-silver-ring"),
            image_url: None,
            search_position: position,
            search_page: 1,
            search_query: Some("silver ring".to_string()),
            scraped_at: Local.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap(),
        }
    }

    pub fn detail_record(description: Option<&str>, tags: &[&str], images: usize) -> DetailRecord {
        DetailRecord {
            base: basic_record(1),
            description: description.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            categories: vec!["Jewelry".to_string(), "Rings".to_string()],
            shop_url: Some("https://www.etsy.com/shop/SilverCraftCo".to_string()),
            image_urls: (0..images)
                .map(|i| format!("https://i.etsystatic.com/il_fullxfull.{i}.jpg"))
                .collect(),
            shipping_info: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn summary_counts_by_kind() {
        let mut summary = RunSummary::default();
        summary.skip(ItemKind::SearchPage, "https://www.etsy.com/search?q=a&page=2", "timeout");
        summary.skip(ItemKind::Detail, "https://www.etsy.com/listing/1", "anchor missing");
        assert_eq!(summary.skipped_of(ItemKind::SearchPage), 1);
        assert_eq!(summary.skipped_of(ItemKind::Listing), 0);
        let report = summary.render();
        assert!(report.contains("Skipped: 2"));
        assert!(report.contains("search page https://www.etsy.com/search?q=a&page=2: timeout"));
    }

    #[test]
    fn metadata_describes_the_run() {
        use chrono::TimeZone;
        let metadata = RunMetadata {
            started_at: Local.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap(),
            query: "silver ring".to_string(),
            pages_requested: 2,
            detailed: true,
        };
        assert_eq!(
            metadata.describe(),
            "Query 'silver ring', 2 pages requested, detailed mode, started 2026-10-14 09:30:00"
        );
    }

    #[test]
    fn basic_record_carries_its_query() {
        let value = serde_json::to_value(basic_record(1)).unwrap();
        assert_eq!(value["search_query"], "silver ring");
    }

    #[test]
    fn basic_record_serializes_absent_fields_as_null() {
        let mut record = basic_record(1);
        record.rating = None;
        record.review_count = None;
        let value = serde_json::to_value(&record).unwrap();
        assert!(value["rating"].is_null());
        assert!(value["review_count"].is_null());
        assert_eq!(value["price"]["currency"], "USD");
    }

    #[test]
    fn detail_record_flattens_base_fields() {
        let record = detail_record(Some("A ring"), &["ring"], 1);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["title"], "Handmade Silver Ring");
        assert_eq!(value["search_position"], 1);
        assert_eq!(value["tags"][0], "ring");
        assert!(value.get("base").is_none());
    }
}
