//! Provider access: queries, quotas, HTTP adapters and table export.

pub mod calendar;
pub mod cboe;
pub mod export;
pub mod finnhub;
mod http;
pub mod polygon;
pub mod provider;
pub mod query;
pub mod rate_limit;

pub use calendar::{DateRange, DEFAULT_LOOKBACK_DAYS};
pub use cboe::{ensure_series, load_series, CboeVolatilitySource, VIX_HISTORY_FILE, VIX_HISTORY_URL};
pub use export::{table_to_dataframe, write_table, ExportFormat, TableMeta};
pub use finnhub::{FinnhubClient, FINNHUB_BASE_URL};
pub use http::REQUEST_TIMEOUT;
pub use polygon::{PolygonClient, POLYGON_BASE_URL};
pub use provider::{DataError, FundamentalsProvider, MarketDataProvider, VolatilitySource};
pub use query::{daily_aggregate_queries, daily_queries, CallMode, Query};
pub use rate_limit::{
    CallQuota, Fetched, Pause, RateLimitedFetcher, RateLimitedFundamentals, RateLimiter,
    ThreadPause,
};
