//! Assembling the wide table: rename, merge, reconcile, attach.

pub mod financials;
pub mod merger;
pub mod rename;
pub mod volatility;

pub use financials::{reconcile, ReconcileOptions, ReconcileReport, DEFAULT_MIN_COVERAGE};
pub use merger::{merge, MergeStats, RowPolicy};
pub use rename::{offset_column, offset_in_days, rename, MetricField, RenamedBatch, RenamedRow, TICKER_COLUMN};
pub use volatility::{attach, slice, VIX_CLOSE};
