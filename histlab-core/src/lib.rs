//! HistLab Core: dataset assembly for market history.
//!
//! This crate holds everything below the pipeline driver:
//! - Domain types (aggregate records, fundamentals, volatility points, the wide table)
//! - Query construction and the lookback calendar
//! - Call-quota enforcement with cooperative cancellation
//! - Column renaming, table merge, fundamentals reconciliation, volatility alignment
//! - Blocking HTTP adapters and CSV/Parquet export

pub mod cancel;
pub mod data;
pub mod domain;
pub mod merge;

pub use cancel::{CancellationToken, Cancelled};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: values handed across the Ctrl-C handler thread and
    /// the pipeline are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<CancellationToken>();
        require_sync::<CancellationToken>();

        require_send::<domain::Table>();
        require_sync::<domain::Table>();
        require_send::<domain::AggregateResponse>();
        require_sync::<domain::AggregateResponse>();
        require_send::<domain::FinancialsRecord>();
        require_sync::<domain::FinancialsRecord>();
        require_send::<domain::VolatilityPoint>();
        require_sync::<domain::VolatilityPoint>();

        require_send::<data::Query>();
        require_sync::<data::Query>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();

        require_send::<merge::ReconcileReport>();
        require_sync::<merge::ReconcileReport>();
    }
}
