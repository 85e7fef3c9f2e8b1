//! HistLab Runner: dataset build orchestration.
//!
//! This crate builds on `histlab-core` to provide:
//! - TOML pipeline configuration with validation
//! - The `build_dataset` driver (aggregates → fundamentals → volatility)
//! - Progress reporting through a trait with a `tracing` default

pub mod config;
pub mod pipeline;
pub mod progress;

pub use config::{ConfigError, FundamentalsConfig, MarketConfig, PipelineConfig, VolatilityConfig};
pub use pipeline::{build_dataset, DatasetRun, PipelineError, RunOptions, RunSummary, Sources};
pub use progress::{BatchOutcome, LogProgress, PipelineProgress};
