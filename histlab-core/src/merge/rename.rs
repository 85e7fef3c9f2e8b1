//! Offset-qualified column names for daily batches.
//!
//! Every daily batch carries the same seven provider fields. Before a batch is
//! folded into the wide table its fields are relabelled with the number of
//! days between the batch date and the window's last date, so
//! `close_price_0_days_before` is the most recent close and batches never
//! collide.

use crate::domain::{AggregateRecord, AggregateResponse};
use chrono::NaiveDate;

/// Name of the transient key column.
pub const TICKER_COLUMN: &str = "ticker";

/// The seven numeric provider fields, in provider order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricField {
    Close,
    High,
    Low,
    Transactions,
    Open,
    Volume,
    VolumeWeighted,
}

impl MetricField {
    pub const ALL: [MetricField; 7] = [
        MetricField::Close,
        MetricField::High,
        MetricField::Low,
        MetricField::Transactions,
        MetricField::Open,
        MetricField::Volume,
        MetricField::VolumeWeighted,
    ];

    /// Field key in the provider's JSON.
    pub fn provider_key(self) -> &'static str {
        match self {
            MetricField::Close => "c",
            MetricField::High => "h",
            MetricField::Low => "l",
            MetricField::Transactions => "n",
            MetricField::Open => "o",
            MetricField::Volume => "v",
            MetricField::VolumeWeighted => "vw",
        }
    }

    /// Column stem used in the table.
    pub fn semantic_name(self) -> &'static str {
        match self {
            MetricField::Close => "close_price",
            MetricField::High => "highest_price",
            MetricField::Low => "lowest_price",
            MetricField::Transactions => "num_transactions",
            MetricField::Open => "open_price",
            MetricField::Volume => "trading_volume",
            MetricField::VolumeWeighted => "trading_volume_weighted",
        }
    }

    pub fn value(self, record: &AggregateRecord) -> Option<f64> {
        match self {
            MetricField::Close => record.close,
            MetricField::High => record.high,
            MetricField::Low => record.low,
            MetricField::Transactions => record.transactions,
            MetricField::Open => record.open,
            MetricField::Volume => record.volume,
            MetricField::VolumeWeighted => record.volume_weighted,
        }
    }

    pub fn column_name(self, offset: i64) -> String {
        offset_column(self.semantic_name(), offset)
    }
}

/// `<stem>_<offset>_days_before`
pub fn offset_column(stem: &str, offset: i64) -> String {
    format!("{stem}_{offset}_days_before")
}

/// Whole days from `date` back from `reference` (the window's last date).
pub fn offset_in_days(date: NaiveDate, reference: NaiveDate) -> i64 {
    (reference - date).num_days()
}

/// One ticker's values under the renamed schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RenamedRow {
    pub ticker: String,
    /// Raw bar timestamp; transient, never written to the table.
    pub unix_timestamp: Option<i64>,
    /// Values in `MetricField::ALL` order.
    pub values: [Option<f64>; 7],
}

/// A batch relabelled for one day offset.
#[derive(Debug, Clone, PartialEq)]
pub struct RenamedBatch {
    pub offset: i64,
    metric_columns: Vec<String>,
    timestamp_column: String,
    pub rows: Vec<RenamedRow>,
}

impl RenamedBatch {
    /// Schema columns: the ticker key followed by the seven metric columns.
    pub fn column_names(&self) -> Vec<&str> {
        std::iter::once(TICKER_COLUMN)
            .chain(self.metric_columns.iter().map(|c| c.as_str()))
            .collect()
    }

    /// The seven offset-qualified metric columns, in `MetricField::ALL` order.
    pub fn metric_columns(&self) -> &[String] {
        &self.metric_columns
    }

    /// Fields carried only while merging.
    pub fn transient_columns(&self) -> [&str; 2] {
        [TICKER_COLUMN, self.timestamp_column.as_str()]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.ticker.as_str())
    }
}

/// Relabel `batch` for `offset`.
pub fn rename(batch: &AggregateResponse, offset: i64) -> RenamedBatch {
    let metric_columns = MetricField::ALL
        .iter()
        .map(|f| f.column_name(offset))
        .collect();

    let rows = batch
        .results
        .iter()
        .map(|record| RenamedRow {
            ticker: record.ticker.clone(),
            unix_timestamp: record.timestamp,
            values: MetricField::ALL.map(|f| f.value(record)),
        })
        .collect();

    RenamedBatch {
        offset,
        metric_columns,
        timestamp_column: offset_column("unix_timestamp", offset),
        rows,
    }
}
