//! Finnhub basic-financials adapter.

use super::http;
use super::provider::{DataError, FundamentalsProvider};
use crate::domain::FinancialsRecord;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

pub const FINNHUB_BASE_URL: &str = "https://finnhub.io/api/v1";

#[derive(Debug, Deserialize)]
struct MetricResponse {
    /// Absent (or `{}`) for unknown symbols.
    #[serde(default)]
    metric: HashMap<String, Value>,
}

/// Every key the provider listed counts towards coverage. Numbers keep their
/// value; `null` and non-numeric values (dates, strings) become `None`.
fn to_record(ticker: &str, resp: MetricResponse) -> FinancialsRecord {
    let metrics: BTreeMap<String, Option<f64>> = resp
        .metric
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Number(n) => n.as_f64(),
                _ => None,
            };
            (key, value)
        })
        .collect();
    FinancialsRecord::new(ticker, metrics)
}

/// Blocking Finnhub REST client.
pub struct FinnhubClient {
    client: Client,
    base_url: String,
    token: String,
}

impl FinnhubClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DataError> {
        Self::with_base_url(FINNHUB_BASE_URL, token)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, DataError> {
        Ok(Self {
            client: http::build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn url(&self, ticker: &str) -> String {
        format!(
            "{}/stock/metric?symbol={ticker}&metric=all&token={}",
            self.base_url, self.token
        )
    }
}

impl FundamentalsProvider for FinnhubClient {
    fn name(&self) -> &str {
        "finnhub"
    }

    fn fetch_financials(&self, ticker: &str) -> Result<FinancialsRecord, DataError> {
        let context = format!("finnhub metrics for {ticker}");
        let resp: Option<MetricResponse> = http::get_json(&self.client, &self.url(ticker), &context)?;
        match resp {
            Some(resp) => Ok(to_record(ticker, resp)),
            None => Err(DataError::PerTickerFetch {
                ticker: ticker.to_string(),
                reason: "symbol not found".into(),
            }),
        }
    }
}
