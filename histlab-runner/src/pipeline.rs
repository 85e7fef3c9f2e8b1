//! Dataset build driver.
//!
//! Stages, in order:
//! 1. one grouped-daily fetch per date in the lookback window, each batch
//!    renamed for its day offset and merged into the table;
//! 2. fundamentals reconciliation over the table's tickers;
//! 3. volatility columns for every merged offset.
//!
//! The run is single-threaded and blocks only inside quota pauses. A
//! cancelled run is not an error: it returns the table built so far with
//! `completed = false`.

use chrono::NaiveDate;
use histlab_core::cancel::CancellationToken;
use histlab_core::data::{
    cboe, daily_aggregate_queries, DataError, DateRange, Fetched, FundamentalsProvider,
    MarketDataProvider, Pause, RateLimitedFetcher, RateLimitedFundamentals, RateLimiter,
    VolatilitySource,
};
use histlab_core::domain::Table;
use histlab_core::merge::{self, ReconcileReport};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, PipelineConfig};
use crate::progress::{BatchOutcome, PipelineProgress};

/// Errors that abort a build.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
}

/// Collaborators for one build.
pub struct Sources<'a> {
    pub market: &'a dyn MarketDataProvider,
    /// `None` skips reconciliation.
    pub fundamentals: Option<&'a dyn FundamentalsProvider>,
    /// `None` skips volatility columns.
    pub volatility: Option<&'a dyn VolatilitySource>,
    pub pause: &'a dyn Pause,
}

/// Per-run switches that do not belong in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Last date of the window; offsets count back from it.
    pub today: NaiveDate,
    pub skip_financials: bool,
    pub skip_volatility: bool,
    /// Overrides `fundamentals.max_tickers` from the config.
    pub max_tickers: Option<usize>,
}

impl RunOptions {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            skip_financials: false,
            skip_volatility: false,
            max_tickers: None,
        }
    }
}

/// What a build did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub batches_total: usize,
    pub batches_merged: usize,
    pub batches_empty: usize,
    pub batches_failed: usize,
    /// Quota pauses taken by the aggregates fetcher.
    pub pauses: u32,
    pub reconcile: Option<ReconcileReport>,
    pub volatility_columns: Option<usize>,
    pub rows: usize,
    pub columns: usize,
    /// False when the run was cancelled.
    pub completed: bool,
}

/// The table plus its summary.
#[derive(Debug, Clone)]
pub struct DatasetRun {
    pub table: Table,
    pub summary: RunSummary,
}

/// Build the wide dataset.
pub fn build_dataset(
    config: &PipelineConfig,
    sources: &Sources<'_>,
    options: &RunOptions,
    cancel: &CancellationToken,
    progress: &dyn PipelineProgress,
) -> Result<DatasetRun, PipelineError> {
    config.validate()?;

    let range = DateRange::lookback(options.today, config.lookback_days);
    let reference = range.end();
    let queries = daily_aggregate_queries(&range, config.adjusted)?;
    let total = queries.len();

    let mut table = Table::new();
    let mut summary = RunSummary {
        start: range.start(),
        end: range.end(),
        batches_total: total,
        batches_merged: 0,
        batches_empty: 0,
        batches_failed: 0,
        pauses: 0,
        reconcile: None,
        volatility_columns: None,
        rows: 0,
        columns: 0,
        completed: true,
    };

    progress.on_start(&range, total);

    // ── 1. Daily aggregates ──────────────────────────────────────────
    let mut fetcher = RateLimitedFetcher::new(
        sources.market,
        RateLimiter::new(config.market.quota(), sources.pause),
    );
    for (index, (date, query)) in queries.iter().enumerate() {
        let fetched = match fetcher.fetch(query, cancel) {
            Ok(f) => f,
            Err(_) => {
                summary.completed = false;
                break;
            }
        };
        match fetched {
            Fetched::Data(resp) => {
                let batch = merge::rename(&resp, merge::offset_in_days(*date, reference));
                let stats = merge::merge(&mut table, &batch, config.row_policy);
                summary.batches_merged += 1;
                progress.on_batch(*date, index, total, &BatchOutcome::Merged(stats));
            }
            Fetched::Empty => {
                summary.batches_empty += 1;
                progress.on_batch(*date, index, total, &BatchOutcome::Empty);
            }
            Fetched::Failed(err) => {
                summary.batches_failed += 1;
                progress.on_batch(*date, index, total, &BatchOutcome::Failed(&err));
            }
        }
    }
    summary.pauses = fetcher.limiter().pauses();
    if cancel.is_cancelled() {
        summary.completed = false;
    }

    // ── 2. Fundamentals ──────────────────────────────────────────────
    if summary.completed && !options.skip_financials {
        match sources.fundamentals {
            Some(provider) if !table.is_empty() => {
                let mut reconcile_options = config.fundamentals.reconcile_options();
                if options.max_tickers.is_some() {
                    reconcile_options.max_tickers = options.max_tickers;
                }
                let mut fundamentals = RateLimitedFundamentals::new(
                    provider,
                    RateLimiter::new(config.fundamentals.quota(), sources.pause),
                );
                let report =
                    merge::reconcile(&mut table, &mut fundamentals, &reconcile_options, cancel);
                if report.cancelled {
                    summary.completed = false;
                }
                progress.on_reconciled(&report);
                summary.reconcile = Some(report);
            }
            Some(_) => info!("table is empty, skipping fundamentals"),
            None => info!("no fundamentals provider configured, skipping"),
        }
    }

    // ── 3. Volatility ────────────────────────────────────────────────
    if cancel.is_cancelled() {
        summary.completed = false;
    }
    if summary.completed && !options.skip_volatility {
        if let Some(source) = sources.volatility {
            let series =
                cboe::ensure_series(source, &config.volatility.path, config.volatility.refresh)?;
            let window = merge::slice(&series, range.start())?;
            summary.volatility_columns = Some(merge::attach(&mut table, window, reference));
        }
    }

    summary.rows = table.row_count();
    summary.columns = table.column_count();
    progress.on_complete(&summary);

    Ok(DatasetRun { table, summary })
}
