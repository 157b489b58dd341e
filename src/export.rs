//! JSON and CSV export of a finished run
//!
//! Both files share the name `{base_name}_{YYYYMMDD_HHMMSS}`. The CSV is a
//! flattened view of the JSON: nested objects become `parent_child` columns
//! one level deep, lists of scalars are joined with `", "`, and anything
//! deeper is embedded as compact JSON.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::records::{RunResult, ScrapedRecord};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const LIST_SEPARATOR: &str = ", ";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Cannot create output directory {path}: {reason}")]
    CreateDir { path: String, reason: String },

    #[error("Cannot write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Cannot serialize records: {0}")]
    Serialize(String),
}

impl ExportError {
    fn write(path: &Path, reason: impl std::fmt::Display) -> Self {
        ExportError::Write {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Where a run's files were written
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    pub record_count: usize,
}

/// `{base_name}_{YYYYMMDD_HHMMSS}`
pub fn export_stem<Tz: TimeZone>(base_name: &str, timestamp: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}", base_name, timestamp.format(TIMESTAMP_FORMAT))
}

/// Write `results` as JSON and CSV into `dir`
///
/// # Errors
/// [`ExportError`] if `dir` cannot be created or either file cannot be written.
pub fn export<Tz: TimeZone>(
    results: &RunResult,
    dir: &Path,
    base_name: &str,
    timestamp: &DateTime<Tz>,
) -> Result<ExportPaths, ExportError>
where
    Tz::Offset: std::fmt::Display,
{
    fs::create_dir_all(dir).map_err(|e| ExportError::CreateDir {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let stem = export_stem(base_name, timestamp);
    let json_path = dir.join(format!("{stem}.json"));
    let csv_path = dir.join(format!("{stem}.csv"));

    let objects = record_objects(&results.records)?;
    write_json(&json_path, &objects)?;
    write_csv(&csv_path, &objects)?;

    info!(
        "Data saved to {} and {} ({} records)",
        json_path.display(),
        csv_path.display(),
        objects.len()
    );

    Ok(ExportPaths {
        json_path,
        csv_path,
        record_count: objects.len(),
    })
}

fn record_objects(records: &[ScrapedRecord]) -> Result<Vec<Map<String, Value>>, ExportError> {
    records
        .iter()
        .map(|record| match serde_json::to_value(record) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ExportError::Serialize(format!("record is not an object: {other}"))),
            Err(e) => Err(ExportError::Serialize(e.to_string())),
        })
        .collect()
}

fn write_json(path: &Path, objects: &[Map<String, Value>]) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|e| ExportError::write(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, objects).map_err(|e| ExportError::write(path, e))?;
    writer.flush().map_err(|e| ExportError::write(path, e))
}

fn write_csv(path: &Path, objects: &[Map<String, Value>]) -> Result<(), ExportError> {
    let rows: Vec<Map<String, Value>> = objects.iter().map(flatten_record).collect();
    let header = column_union(&rows);

    let mut writer = csv::Writer::from_path(path).map_err(|e| ExportError::write(path, e))?;
    writer.write_record(&header).map_err(|e| ExportError::write(path, e))?;
    for row in &rows {
        let cells = header
            .iter()
            .map(|column| row.get(column).map(cell_text).unwrap_or_default());
        writer.write_record(cells).map_err(|e| ExportError::write(path, e))?;
    }
    writer.flush().map_err(|e| ExportError::write(path, e))
}

/// Flatten nested objects one level into `parent_child` keys
pub fn flatten_record(object: &Map<String, Value>) -> Map<String, Value> {
    let mut flat = Map::new();
    for (key, value) in object {
        match value {
            Value::Object(children) if !children.is_empty() => {
                for (child_key, child) in children {
                    flat.insert(format!("{key}_{child_key}"), child.clone());
                }
            }
            // An empty object has no children to spread; keep a cell for the key itself
            Value::Object(_) => {
                flat.insert(key.clone(), Value::Null);
            }
            other => {
                flat.insert(key.clone(), other.clone());
            }
        }
    }
    flat
}

/// Every column of every row, in first-seen order
pub fn column_union(rows: &[Map<String, Value>]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.iter().any(|column| column == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// Render one flattened value as CSV cell text
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) if items.iter().all(is_scalar) => items
            .iter()
            .map(cell_text)
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}
