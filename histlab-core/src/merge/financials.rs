//! Reconcile per-ticker fundamentals against the wide table.
//!
//! Fundamentals providers return a different metric set for every ticker. The
//! table can only carry metrics every accepted ticker has, so the tracked set
//! starts as the first accepted ticker's keys and each later ticker drops the
//! columns it lacks. The result depends on processing order: once a column
//! is dropped no later ticker brings it back, and a ticker that lacks a column
//! only some earlier tickers had still removes it for everyone.

use crate::cancel::CancellationToken;
use crate::data::provider::DataError;
use crate::data::rate_limit::{Fetched, RateLimitedFundamentals};
use crate::domain::Table;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Minimum number of metric keys for a ticker to stay in the dataset.
pub const DEFAULT_MIN_COVERAGE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileOptions {
    pub min_coverage: usize,
    /// Stop after this many tickers.
    pub max_tickers: Option<usize>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            min_coverage: DEFAULT_MIN_COVERAGE,
            max_tickers: None,
        }
    }
}

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Tickers a fetch was attempted for.
    pub processed: usize,
    pub accepted: usize,
    /// Rows removed for insufficient metric coverage.
    pub discarded: usize,
    /// Fetch failures; those rows stay with empty metric cells.
    pub failed: usize,
    pub cancelled: bool,
    /// Metric columns left in the table, in insertion order.
    pub metric_columns: Vec<String>,
}

/// Fetch fundamentals for every ticker in table order and fold them in.
///
/// Per-ticker fetch failures are logged and skipped. Cancellation (checked
/// before every ticker and inside quota pauses) stops the pass and leaves the
/// table as it stands.
pub fn reconcile(
    table: &mut Table,
    fetcher: &mut RateLimitedFundamentals<'_>,
    options: &ReconcileOptions,
    cancel: &CancellationToken,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    let mut tracked: Vec<String> = Vec::new();
    let mut initialised = false;

    let tickers = table.tickers().to_vec();
    for ticker in &tickers {
        if options.max_tickers.is_some_and(|max| report.processed >= max) {
            info!(max = report.processed, "ticker limit reached, stopping reconciliation");
            break;
        }
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let Ok(fetched) = fetcher.fetch(ticker, cancel) else {
            report.cancelled = true;
            break;
        };
        report.processed += 1;
        let record = match fetched {
            Fetched::Data(record) => record,
            Fetched::Empty => {
                report.failed += 1;
                continue;
            }
            Fetched::Failed(e) => {
                let err = DataError::PerTickerFetch {
                    ticker: ticker.clone(),
                    reason: e.to_string(),
                };
                warn!(error = %err, "skipping ticker");
                report.failed += 1;
                continue;
            }
        };

        if record.len() < options.min_coverage {
            debug!(
                ticker = ticker.as_str(),
                metrics = record.len(),
                min = options.min_coverage,
                "insufficient metric coverage, discarding row"
            );
            table.remove_row(ticker);
            report.discarded += 1;
            continue;
        }

        if !initialised {
            for key in record.keys() {
                if table.has_column(key) {
                    debug!(metric = key, "metric name collides with an existing column, skipping");
                    continue;
                }
                table.insert_empty_column(key);
                tracked.push(key.to_string());
            }
            initialised = true;
        } else {
            let to_drop: Vec<String> = tracked
                .iter()
                .filter(|c| !record.contains(c))
                .cloned()
                .collect();
            if !to_drop.is_empty() {
                debug!(ticker = ticker.as_str(), dropped = to_drop.len(), "narrowing metric columns");
            }
            for column in &to_drop {
                table.drop_column(column);
            }
            tracked.retain(|c| record.contains(c));
        }

        let mut null_columns = Vec::new();
        for column in &tracked {
            match record.value(column) {
                Some(value) => {
                    table.set(ticker, column, Some(value));
                }
                None => null_columns.push(column.clone()),
            }
        }
        for column in &null_columns {
            table.drop_column(column);
        }
        tracked.retain(|c| !null_columns.contains(c));

        report.accepted += 1;
    }

    report.metric_columns = tracked;
    info!(
        processed = report.processed,
        accepted = report.accepted,
        discarded = report.discarded,
        failed = report.failed,
        metric_columns = report.metric_columns.len(),
        cancelled = report.cancelled,
        "fundamentals reconciled"
    );
    report
}
