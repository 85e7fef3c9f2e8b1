//! Provider capability traits and structured error types.
//!
//! The three collaborators of the dataset pipeline (market aggregates,
//! per-ticker fundamentals, the volatility series file) sit behind these
//! traits so the HTTP adapters can be swapped for in-memory mocks in tests.

use super::query::{CallMode, Query};
use crate::domain::{AggregateResponse, FinancialsRecord};
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI logs as-is.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("query mode '{mode}' requires parameter '{param}'")]
    MissingParameter { mode: CallMode, param: &'static str },

    #[error("unknown call mode '{0}' (expected daily, daily_aggregate or time_period_aggregate)")]
    UnknownCallMode(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("required resource missing: {}", path.display())]
    MissingResource { path: PathBuf },

    #[error("volatility series has no entry on or after {start}")]
    Alignment { start: NaiveDate },

    #[error("fundamentals fetch failed for '{ticker}': {reason}")]
    PerTickerFetch { ticker: String, reason: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("HTTP {status} from {context}")]
    Http { status: u16, context: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export error: {0}")]
    Export(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Market aggregates source (Polygon-style REST API).
pub trait MarketDataProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Issue one query. A day without trading comes back as an empty
    /// response, not an error.
    fn fetch_aggregate(&self, query: &Query) -> Result<AggregateResponse, DataError>;
}

/// Per-ticker fundamentals source (Finnhub-style basic financials).
pub trait FundamentalsProvider {
    fn name(&self) -> &str;

    fn fetch_financials(&self, ticker: &str) -> Result<FinancialsRecord, DataError>;
}

/// Out-of-band source of the volatility index history file.
pub trait VolatilitySource {
    fn name(&self) -> &str;

    /// Download (or otherwise produce) the series file at `dest`.
    fn acquire(&self, dest: &Path) -> Result<(), DataError>;
}
