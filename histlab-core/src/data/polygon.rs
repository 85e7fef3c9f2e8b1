//! Polygon.io market aggregates adapter.
//!
//! Grouped-daily and ticker-range responses share one bar shape; the per-ticker
//! open/close endpoint has its own and is normalised into a one-record
//! `AggregateResponse` so the pipeline sees a single format.

use super::http;
use super::provider::{DataError, MarketDataProvider};
use super::query::{CallMode, Query};
use crate::domain::{AggregateRecord, AggregateResponse};
use reqwest::blocking::Client;
use serde::Deserialize;

pub const POLYGON_BASE_URL: &str = "https://api.polygon.io";

/// `/v2/aggs/...` response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggsResponse {
    #[serde(default)]
    query_count: u64,
    #[serde(default)]
    results: Option<Vec<AggBar>>,
    /// Present on ticker-range responses only.
    #[serde(default)]
    ticker: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AggBar {
    #[serde(rename = "T", default)]
    ticker: Option<String>,
    c: Option<f64>,
    h: Option<f64>,
    l: Option<f64>,
    n: Option<f64>,
    o: Option<f64>,
    v: Option<f64>,
    vw: Option<f64>,
    t: Option<i64>,
}

/// `/v1/open-close/...` response.
#[derive(Debug, Deserialize)]
struct OpenCloseResponse {
    status: String,
    #[serde(default)]
    symbol: Option<String>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

fn aggs_to_response(resp: AggsResponse, fallback_ticker: Option<&str>) -> AggregateResponse {
    let range_ticker = resp.ticker.as_deref().or(fallback_ticker);
    let results: Vec<AggregateRecord> = resp
        .results
        .unwrap_or_default()
        .into_iter()
        .filter_map(|bar| {
            let ticker = bar.ticker.or_else(|| range_ticker.map(str::to_string))?;
            Some(AggregateRecord {
                ticker,
                close: bar.c,
                high: bar.h,
                low: bar.l,
                transactions: bar.n,
                open: bar.o,
                volume: bar.v,
                volume_weighted: bar.vw,
                timestamp: bar.t,
            })
        })
        .collect();

    AggregateResponse {
        query_count: resp.query_count,
        results,
    }
}

fn open_close_to_response(resp: OpenCloseResponse, fallback_ticker: &str) -> AggregateResponse {
    if resp.status != "OK" {
        return AggregateResponse::default();
    }
    let record = AggregateRecord {
        close: resp.close,
        high: resp.high,
        low: resp.low,
        open: resp.open,
        volume: resp.volume,
        ..AggregateRecord::empty(resp.symbol.unwrap_or_else(|| fallback_ticker.to_string()))
    };
    AggregateResponse::new(vec![record])
}

/// Blocking Polygon REST client.
pub struct PolygonClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl PolygonClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, DataError> {
        Self::with_base_url(POLYGON_BASE_URL, api_key)
    }

    pub fn with_base_url(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, DataError> {
        Ok(Self {
            client: http::build_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn url(&self, query: &Query) -> String {
        format!("{}{}&apiKey={}", self.base_url, query.path(), self.api_key)
    }
}

impl MarketDataProvider for PolygonClient {
    fn name(&self) -> &str {
        "polygon"
    }

    fn fetch_aggregate(&self, query: &Query) -> Result<AggregateResponse, DataError> {
        let url = self.url(query);
        let context = format!("polygon {}", query.mode());

        match query.mode() {
            CallMode::Daily => {
                let resp: Option<OpenCloseResponse> = http::get_json(&self.client, &url, &context)?;
                Ok(resp
                    .map(|r| open_close_to_response(r, query.get("ticker").unwrap_or_default()))
                    .unwrap_or_default())
            }
            CallMode::DailyAggregate | CallMode::TimePeriodAggregate => {
                let resp: Option<AggsResponse> = http::get_json(&self.client, &url, &context)?;
                Ok(resp
                    .map(|r| aggs_to_response(r, query.get("ticker")))
                    .unwrap_or_default())
            }
        }
    }
}
