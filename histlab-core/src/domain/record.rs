//! Provider records: what one fetch hands back to the core.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One ticker's aggregate bar for one day, with the provider's fixed fields.
///
/// Numeric fields are optional because providers omit them for thinly
/// traded symbols (e.g. no `vw` or `n` on a zero-volume day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub ticker: String,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub transactions: Option<f64>,
    pub open: Option<f64>,
    pub volume: Option<f64>,
    pub volume_weighted: Option<f64>,
    /// Unix epoch milliseconds of the bar start.
    pub timestamp: Option<i64>,
}

impl AggregateRecord {
    /// A record with every numeric field absent.
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            close: None,
            high: None,
            low: None,
            transactions: None,
            open: None,
            volume: None,
            volume_weighted: None,
            timestamp: None,
        }
    }
}

/// Decoded response of one aggregate fetch (a "batch").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateResponse {
    pub query_count: u64,
    pub results: Vec<AggregateRecord>,
}

impl AggregateResponse {
    pub fn new(results: Vec<AggregateRecord>) -> Self {
        Self {
            query_count: results.len() as u64,
            results,
        }
    }

    /// Weekends and market holidays come back with `queryCount == 0`.
    pub fn is_empty(&self) -> bool {
        self.query_count == 0 || self.results.is_empty()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }
}

/// Fundamentals metric set for one ticker.
///
/// Keys are provider-defined and vary per ticker; a `None` value means the
/// provider listed the metric but had no number for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialsRecord {
    pub ticker: String,
    pub metrics: BTreeMap<String, Option<f64>>,
}

impl FinancialsRecord {
    pub fn new(ticker: impl Into<String>, metrics: BTreeMap<String, Option<f64>>) -> Self {
        Self {
            ticker: ticker.into(),
            metrics,
        }
    }

    /// Metric coverage: number of keys, null-valued ones included.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn contains(&self, metric: &str) -> bool {
        self.metrics.contains_key(metric)
    }

    /// Value of a metric, `None` when the key is absent or its value is null.
    pub fn value(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied().flatten()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(|k| k.as_str())
    }
}

/// One observation of the volatility index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityPoint {
    pub date: NaiveDate,
    /// Index close for the day.
    pub value: f64,
}
