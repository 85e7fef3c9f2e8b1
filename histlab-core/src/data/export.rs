//! Table export to CSV or Parquet.
//!
//! Writes are atomic (write to `.tmp`, rename into place) and every export
//! gets a `<path>.meta.json` sidecar with shape, merged offsets and a content
//! hash.

use super::cboe::tmp_path;
use super::provider::DataError;
use crate::domain::Table;
use crate::merge::TICKER_COLUMN;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Output format, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Parquet,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, DataError> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("csv") => Ok(ExportFormat::Csv),
            Some("parquet") => Ok(ExportFormat::Parquet),
            _ => Err(DataError::Export(format!(
                "unsupported output extension for {} (expected .csv or .parquet)",
                path.display()
            ))),
        }
    }
}

/// Sidecar written next to every export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub rows: usize,
    /// Data columns, excluding the ticker key.
    pub columns: usize,
    pub offsets: Vec<i64>,
    pub format: ExportFormat,
    pub data_hash: String,
    pub created_at: chrono::NaiveDateTime,
}

/// `<path>.meta.json`
pub fn meta_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

/// BLAKE3 over tickers, column names and cell values, in table order.
pub fn table_hash(table: &Table) -> String {
    let mut hasher = blake3::Hasher::new();
    for ticker in table.tickers() {
        hasher.update(ticker.as_bytes());
        hasher.update(&[0]);
    }
    for column in table.columns() {
        hasher.update(column.name.as_bytes());
        hasher.update(&[0]);
        for value in &column.values {
            match value {
                Some(v) => {
                    hasher.update(&[1]);
                    hasher.update(&v.to_le_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// `ticker` string column followed by one nullable f64 column per table column.
pub fn table_to_dataframe(table: &Table) -> Result<DataFrame, DataError> {
    let mut columns = Vec::with_capacity(table.column_count() + 1);
    columns.push(Column::new(TICKER_COLUMN.into(), table.tickers()));
    for column in table.columns() {
        columns.push(Column::new(column.name.as_str().into(), column.values.as_slice()));
    }
    DataFrame::new(columns).map_err(|e| DataError::Export(format!("dataframe creation: {e}")))
}

/// Write `table` to `path` (CSV or Parquet by extension) plus its sidecar.
pub fn write_table(table: &Table, path: &Path) -> Result<TableMeta, DataError> {
    let format = ExportFormat::from_path(path)?;
    let mut df = table_to_dataframe(table)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = tmp_path(path);
    let file = fs::File::create(&tmp)?;
    let written = match format {
        ExportFormat::Csv => CsvWriter::new(file)
            .include_header(true)
            .finish(&mut df)
            .map_err(|e| DataError::Export(format!("write csv: {e}"))),
        ExportFormat::Parquet => ParquetWriter::new(file)
            .finish(&mut df)
            .map(|_| ())
            .map_err(|e| DataError::Export(format!("write parquet: {e}"))),
    };
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::Export(format!("atomic rename failed: {e}"))
    })?;

    let meta = TableMeta {
        rows: table.row_count(),
        columns: table.column_count(),
        offsets: table.offsets().iter().copied().collect(),
        format,
        data_hash: table_hash(table),
        created_at: chrono::Local::now().naive_local(),
    };
    let meta_json = serde_json::to_string_pretty(&meta)
        .map_err(|e| DataError::Export(format!("meta serialization: {e}")))?;
    fs::write(meta_path(path), meta_json)?;

    info!(
        path = %path.display(),
        rows = meta.rows,
        columns = meta.columns,
        "table written"
    );
    Ok(meta)
}
