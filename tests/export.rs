//! Export of mixed basic and detailed records to JSON and CSV

use std::fs;

use chrono::{Local, TimeZone};
use serde_json::Value;

use etsy_seo_scraper::export::{ExportError, cell_text, export, flatten_record};
use etsy_seo_scraper::records::{
    BasicRecord, DetailRecord, DetailedRecord, Price, RunMetadata, RunResult, RunSummary, ScrapedRecord,
};
use etsy_seo_scraper::seo::{SeoConfig, SeoScorer};

fn basic(id: &str, position: u32) -> BasicRecord {
    BasicRecord {
        product_id: id.to_string(),
        title: "Handmade Silver Ring".to_string(),
        price: Price {
            amount: 24.99,
            currency: "USD".to_string(),
        },
        shop_name: Some("SilverCraftCo".to_string()),
        rating: Some(4.8),
        review_count: Some(120),
        product_url: format!("https://www.etsy.com/listing/{id}/handmade-silver-ring"),
        image_url: None,
        search_position: position,
        search_page: 1,
        search_query: Some("silver ring".to_string()),
        scraped_at: Local.with_ymd_and_hms(2026, 10, 14, 9, 30, 0).unwrap(),
    }
}

fn detailed(id: &str, position: u32) -> ScrapedRecord {
    let detail = DetailRecord {
        base: basic(id, position),
        description: Some("Sterling silver ring, handmade to order. Silver polish included.".to_string()),
        tags: vec!["silver ring".to_string(), "gift".to_string()],
        categories: vec!["Jewelry".to_string(), "Rings".to_string()],
        shop_url: Some("https://www.etsy.com/shop/SilverCraftCo".to_string()),
        image_urls: vec!["https://i.etsystatic.com/1/il_fullxfull.a.jpg".to_string()],
        shipping_info: None,
    };
    let seo_analysis = SeoScorer::new(SeoConfig::default(), "silver ring").score(&detail);
    ScrapedRecord::Detailed(Box::new(DetailedRecord { detail, seo_analysis }))
}

fn run_result(records: Vec<ScrapedRecord>) -> RunResult {
    RunResult {
        metadata: RunMetadata {
            started_at: Local::now(),
            query: "silver ring".to_string(),
            pages_requested: 1,
            detailed: true,
        },
        summary: RunSummary {
            records_succeeded: records.len(),
            pages_succeeded: 1,
            ..RunSummary::default()
        },
        records,
    }
}

fn read_csv(path: &std::path::Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|row| row.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

#[test]
fn every_json_field_is_in_its_csv_row() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_result(vec![detailed("101", 1), ScrapedRecord::Basic(basic("102", 2))]);
    let timestamp = Local.with_ymd_and_hms(2026, 10, 14, 10, 0, 0).unwrap();

    let paths = export(&result, dir.path(), "etsy_data", &timestamp).unwrap();
    assert_eq!(paths.record_count, 2);
    assert!(paths.json_path.ends_with("etsy_data_20261014_100000.json"));
    assert!(paths.csv_path.ends_with("etsy_data_20261014_100000.csv"));

    let json: Vec<Value> = serde_json::from_str(&fs::read_to_string(&paths.json_path).unwrap()).unwrap();
    assert_eq!(json.len(), 2);

    let (header, rows) = read_csv(&paths.csv_path);
    assert_eq!(rows.len(), 2);

    for (object, row) in json.iter().zip(&rows) {
        let flat = flatten_record(object.as_object().unwrap());
        for (key, value) in &flat {
            let column = header
                .iter()
                .position(|column| column == key)
                .unwrap_or_else(|| panic!("column {key} missing from CSV"));
            assert_eq!(row[column], cell_text(value), "cell {key}");
        }
    }
}

#[test]
fn basic_rows_leave_detail_columns_empty() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_result(vec![detailed("101", 1), ScrapedRecord::Basic(basic("102", 2))]);

    let paths = export(&result, dir.path(), "mixed", &Local::now()).unwrap();
    let (header, rows) = read_csv(&paths.csv_path);

    let description = header.iter().position(|c| c == "description").unwrap();
    let score = header.iter().position(|c| c == "seo_analysis_seo_score").unwrap();
    let price = header.iter().position(|c| c == "price_amount").unwrap();

    assert!(!rows[0][description].is_empty());
    assert!(!rows[0][score].is_empty());
    assert_eq!(rows[1][description], "");
    assert_eq!(rows[1][score], "");
    assert_eq!(rows[1][price], "24.99");
}

#[test]
fn basic_record_fields_appear_in_json() {
    let dir = tempfile::tempdir().unwrap();
    let result = run_result(vec![ScrapedRecord::Basic(basic("555", 1))]);

    let paths = export(&result, dir.path(), "etsy_data", &Local::now()).unwrap();
    let json: Value = serde_json::from_str(&fs::read_to_string(&paths.json_path).unwrap()).unwrap();
    let record = &json[0];

    assert_eq!(record["product_id"], "555");
    assert_eq!(record["title"], "Handmade Silver Ring");
    assert_eq!(record["price"]["amount"], 24.99);
    assert_eq!(record["price"]["currency"], "USD");
    assert_eq!(record["shop_name"], "SilverCraftCo");
    assert_eq!(record["rating"], 4.8);
    assert_eq!(record["review_count"], 120);
    assert_eq!(record["search_position"], 1);
    assert_eq!(record["search_query"], "silver ring");
    assert!(record["image_url"].is_null());
}

#[test]
fn empty_run_still_writes_both_files() {
    let dir = tempfile::tempdir().unwrap();
    let paths = export(&run_result(Vec::new()), dir.path(), "empty", &Local::now()).unwrap();

    assert_eq!(fs::read_to_string(&paths.json_path).unwrap().trim(), "[]");
    assert!(paths.csv_path.exists());
    assert_eq!(paths.record_count, 0);
}

#[test]
fn unwritable_location_is_an_export_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-directory");
    fs::write(&blocker, "").unwrap();

    let result = run_result(vec![ScrapedRecord::Basic(basic("1", 1))]);
    let err = export(&result, &blocker.join("data"), "etsy_data", &Local::now()).unwrap_err();

    assert!(matches!(err, ExportError::CreateDir { .. }));
}
