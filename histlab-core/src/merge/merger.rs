//! Fold renamed daily batches into the wide table.
//!
//! Values are joined on ticker, not copied by row position: the provider makes
//! no promise that two days list tickers in the same order, and a positional
//! copy would silently attach one ticker's prices to another.

use super::rename::RenamedBatch;
use crate::domain::Table;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Which rows survive a merge into a non-empty table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowPolicy {
    /// Keep every table row; tickers the batch lacks get `None`, tickers only
    /// the batch has are ignored.
    #[default]
    KeepTable,
    /// Keep only tickers present in both the table and the batch.
    Intersect,
}

/// What one merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub seeded: bool,
    pub added_columns: usize,
    /// Table rows that received values from the batch.
    pub matched_rows: usize,
    /// Batch tickers with no table row.
    pub ignored_tickers: usize,
    /// Table rows removed under `RowPolicy::Intersect`.
    pub dropped_rows: usize,
}

/// Merge `batch` into `table`.
///
/// An empty table is seeded with the batch's tickers (first record wins on a
/// duplicate ticker). The batch's seven metric columns are then added, joined
/// on ticker, and the batch offset is recorded.
pub fn merge(table: &mut Table, batch: &RenamedBatch, policy: RowPolicy) -> MergeStats {
    let mut stats = MergeStats::default();

    if table.is_empty() {
        for ticker in batch.tickers() {
            table.push_row(ticker);
        }
        stats.seeded = true;
    }

    // Union of both ticker sets; every record is a member by construction.
    let universe: HashSet<&str> = table
        .tickers()
        .iter()
        .map(|t| t.as_str())
        .chain(batch.tickers())
        .collect();

    let mut by_ticker = HashMap::with_capacity(batch.len());
    for row in batch.rows.iter().filter(|r| universe.contains(r.ticker.as_str())) {
        by_ticker.entry(row.ticker.as_str()).or_insert(row);
    }

    if policy == RowPolicy::Intersect && !stats.seeded {
        let before = table.row_count();
        table.retain_rows(|t| by_ticker.contains_key(t));
        stats.dropped_rows = before - table.row_count();
    }

    stats.ignored_tickers = by_ticker
        .keys()
        .filter(|t| !table.contains_ticker(t))
        .count();

    let mut columns: Vec<Vec<Option<f64>>> = vec![vec![None; table.row_count()]; 7];
    for (i, ticker) in table.tickers().iter().enumerate() {
        if let Some(row) = by_ticker.get(ticker.as_str()) {
            for (k, value) in row.values.iter().enumerate() {
                columns[k][i] = *value;
            }
            stats.matched_rows += 1;
        }
    }

    for (name, values) in batch.metric_columns().iter().zip(columns) {
        if !table.has_column(name) {
            stats.added_columns += 1;
        }
        table.insert_column(name.clone(), values);
    }
    table.record_offset(batch.offset);

    debug!(
        offset = batch.offset,
        rows = table.row_count(),
        matched = stats.matched_rows,
        ignored = stats.ignored_tickers,
        dropped = stats.dropped_rows,
        "merged batch"
    );
    stats
}
