//! Provider query construction.
//!
//! A `Query` is a validated parameter set for one of three call modes. Building
//! one is pure: it checks that every parameter the mode needs is present and
//! keeps exactly those, and `path()` renders the provider request path. The
//! adapter adds host and credentials when it sends the request.

use super::calendar::{DateRange, ISO_DATE};
use super::provider::DataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Which provider endpoint a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMode {
    /// Open/close for one ticker on one date.
    Daily,
    /// Grouped bars for the whole market on one date.
    DailyAggregate,
    /// Bars for one ticker over a date span.
    TimePeriodAggregate,
}

impl CallMode {
    pub const ALL: [CallMode; 3] = [
        CallMode::Daily,
        CallMode::DailyAggregate,
        CallMode::TimePeriodAggregate,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CallMode::Daily => "daily",
            CallMode::DailyAggregate => "daily_aggregate",
            CallMode::TimePeriodAggregate => "time_period_aggregate",
        }
    }

    /// Parameters this mode cannot be built without, in declaration order.
    pub fn required_params(self) -> &'static [&'static str] {
        match self {
            CallMode::Daily => &["ticker", "date", "adjusted"],
            CallMode::DailyAggregate => &["date", "adjusted"],
            CallMode::TimePeriodAggregate => &[
                "ticker",
                "range",
                "timespan",
                "start_date",
                "end_date",
                "adjusted",
                "limit",
            ],
        }
    }
}

impl fmt::Display for CallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CallMode {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, DataError> {
        CallMode::ALL
            .into_iter()
            .find(|m| m.name() == s.trim())
            .ok_or_else(|| DataError::UnknownCallMode(s.to_string()))
    }
}

/// A validated provider query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    mode: CallMode,
    params: BTreeMap<String, String>,
}

impl Query {
    /// Validate `params` against `mode`.
    ///
    /// Fails with `MissingParameter` on the first required key that is absent.
    /// Keys the mode does not use are dropped.
    pub fn build<I, K, V>(mode: CallMode, params: I) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut supplied: BTreeMap<String, String> = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut kept = BTreeMap::new();
        for &param in mode.required_params() {
            let value = supplied
                .remove(param)
                .ok_or(DataError::MissingParameter { mode, param })?;
            kept.insert(param.to_string(), value);
        }

        Ok(Self { mode, params: kept })
    }

    pub fn mode(&self) -> CallMode {
        self.mode
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|v| v.as_str())
    }

    /// Request path and query string, without host or credentials.
    pub fn path(&self) -> String {
        // `build` guarantees every key below is present.
        let p = |key: &str| self.get(key).unwrap_or_default();
        match self.mode {
            CallMode::Daily => format!(
                "/v1/open-close/{}/{}?adjusted={}",
                p("ticker"),
                p("date"),
                p("adjusted")
            ),
            CallMode::DailyAggregate => format!(
                "/v2/aggs/grouped/locale/us/market/stocks/{}?adjusted={}",
                p("date"),
                p("adjusted")
            ),
            CallMode::TimePeriodAggregate => format!(
                "/v2/aggs/ticker/{}/range/{}/{}/{}/{}?adjusted={}&sort=asc&limit={}",
                p("ticker"),
                p("range"),
                p("timespan"),
                p("start_date"),
                p("end_date"),
                p("adjusted"),
                p("limit")
            ),
        }
    }
}

/// One grouped-daily query per date in `range`, paired with its date.
pub fn daily_aggregate_queries(
    range: &DateRange,
    adjusted: bool,
) -> Result<Vec<(NaiveDate, Query)>, DataError> {
    range
        .iter()
        .map(|date| {
            let query = Query::build(
                CallMode::DailyAggregate,
                [
                    ("date", date.format(ISO_DATE).to_string()),
                    ("adjusted", adjusted.to_string()),
                ],
            )?;
            Ok((date, query))
        })
        .collect()
}

/// One open/close query per date in `range` for a single ticker.
pub fn daily_queries(
    ticker: &str,
    range: &DateRange,
    adjusted: bool,
) -> Result<Vec<(NaiveDate, Query)>, DataError> {
    range
        .iter()
        .map(|date| {
            let query = Query::build(
                CallMode::Daily,
                [
                    ("ticker", ticker.to_string()),
                    ("date", date.format(ISO_DATE).to_string()),
                    ("adjusted", adjusted.to_string()),
                ],
            )?;
            Ok((date, query))
        })
        .collect()
}
