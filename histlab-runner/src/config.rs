//! Pipeline configuration, loaded from TOML.
//!
//! Every section has defaults, so an empty file is a valid config for the
//! free-tier providers.

use histlab_core::data::calendar::DEFAULT_LOOKBACK_DAYS;
use histlab_core::data::cboe::{VIX_HISTORY_FILE, VIX_HISTORY_URL};
use histlab_core::data::finnhub::FINNHUB_BASE_URL;
use histlab_core::data::polygon::POLYGON_BASE_URL;
use histlab_core::data::rate_limit::CallQuota;
use histlab_core::merge::{ReconcileOptions, RowPolicy, DEFAULT_MIN_COVERAGE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level configuration for one dataset build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Calendar days before today to request.
    pub lookback_days: u32,
    /// Request split-adjusted aggregates.
    pub adjusted: bool,
    pub row_policy: RowPolicy,
    pub market: MarketConfig,
    pub fundamentals: FundamentalsConfig,
    pub volatility: VolatilityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            adjusted: true,
            row_policy: RowPolicy::default(),
            market: MarketConfig::default(),
            fundamentals: FundamentalsConfig::default(),
            volatility: VolatilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub base_url: String,
    pub quota_calls: u32,
    pub quota_window_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        let quota = CallQuota::aggregates();
        Self {
            base_url: POLYGON_BASE_URL.to_string(),
            quota_calls: quota.calls,
            quota_window_secs: quota.window.as_secs(),
        }
    }
}

impl MarketConfig {
    pub fn quota(&self) -> CallQuota {
        CallQuota::new(self.quota_calls, Duration::from_secs(self.quota_window_secs))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalsConfig {
    pub base_url: String,
    pub quota_calls: u32,
    pub quota_window_secs: u64,
    /// Tickers with fewer metrics than this are dropped from the dataset.
    pub min_coverage: usize,
    pub max_tickers: Option<usize>,
}

impl Default for FundamentalsConfig {
    fn default() -> Self {
        let quota = CallQuota::fundamentals();
        Self {
            base_url: FINNHUB_BASE_URL.to_string(),
            quota_calls: quota.calls,
            quota_window_secs: quota.window.as_secs(),
            min_coverage: DEFAULT_MIN_COVERAGE,
            max_tickers: None,
        }
    }
}

impl FundamentalsConfig {
    pub fn quota(&self) -> CallQuota {
        CallQuota::new(self.quota_calls, Duration::from_secs(self.quota_window_secs))
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            min_coverage: self.min_coverage,
            max_tickers: self.max_tickers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub url: String,
    /// Local series file.
    pub path: PathBuf,
    /// Download even when `path` already exists.
    pub refresh: bool,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            url: VIX_HISTORY_URL.to_string(),
            path: PathBuf::from(VIX_HISTORY_FILE),
            refresh: false,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> ConfigError {
            ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            }
        }

        if self.lookback_days == 0 {
            return Err(invalid("lookback_days", "must be greater than zero"));
        }
        if self.market.quota_calls == 0 {
            return Err(invalid("market.quota_calls", "must be greater than zero"));
        }
        if self.market.quota_window_secs == 0 {
            return Err(invalid("market.quota_window_secs", "must be greater than zero"));
        }
        if self.fundamentals.quota_calls == 0 {
            return Err(invalid("fundamentals.quota_calls", "must be greater than zero"));
        }
        if self.fundamentals.quota_window_secs == 0 {
            return Err(invalid(
                "fundamentals.quota_window_secs",
                "must be greater than zero",
            ));
        }
        if self.fundamentals.max_tickers == Some(0) {
            return Err(invalid("fundamentals.max_tickers", "must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_free_tier_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.lookback_days, 730);
        assert_eq!(config.market.quota(), CallQuota::aggregates());
        assert_eq!(config.fundamentals.quota(), CallQuota::fundamentals());
        assert_eq!(config.fundamentals.min_coverage, 100);
        assert_eq!(config.row_policy, RowPolicy::KeepTable);
    }

    #[test]
    fn parses_all_sections() {
        let toml = r#"
            lookback_days = 30
            adjusted = false
            row_policy = "intersect"

            [market]
            base_url = "http://localhost:8080"
            quota_calls = 100

            [fundamentals]
            min_coverage = 50
            max_tickers = 30

            [volatility]
            path = "data/vix.csv"
            refresh = true
        "#;
        let config = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(config.lookback_days, 30);
        assert!(!config.adjusted);
        assert_eq!(config.row_policy, RowPolicy::Intersect);
        assert_eq!(config.market.base_url, "http://localhost:8080");
        assert_eq!(config.market.quota().calls, 100);
        assert_eq!(config.market.quota_window_secs, 60);
        assert_eq!(config.fundamentals.reconcile_options().max_tickers, Some(30));
        assert_eq!(config.volatility.path, PathBuf::from("data/vix.csv"));
        assert!(config.volatility.refresh);
    }

    #[test]
    fn rejects_zero_quota() {
        let err = PipelineConfig::from_toml("[market]\nquota_calls = 0\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "market.quota_calls",
                ..
            }
        ));
    }

    #[test]
    fn rejects_zero_lookback() {
        assert!(PipelineConfig::from_toml("lookback_days = 0").is_err());
    }

    #[test]
    fn unknown_row_policy_is_a_parse_error() {
        let err = PipelineConfig::from_toml("row_policy = \"outer\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("histlab.toml");
        std::fs::write(&path, "lookback_days = 10\n").unwrap();
        assert_eq!(PipelineConfig::from_file(&path).unwrap().lookback_days, 10);

        let missing = PipelineConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Read { .. }));
    }
}
