//! CBOE volatility index history: download and parse.
//!
//! The series lives in a local CSV file (`DATE,OPEN,HIGH,LOW,CLOSE`). It is
//! downloaded out of band, then validated present and loaded.

use super::http;
use super::provider::{DataError, VolatilitySource};
use crate::domain::VolatilityPoint;
use chrono::NaiveDate;
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const VIX_HISTORY_URL: &str =
    "https://cdn.cboe.com/api/global/us_indices/daily_prices/VIX_History.csv";

/// Default local file name for the series.
pub const VIX_HISTORY_FILE: &str = "VIX_History.csv";

/// Downloads the index history CSV.
pub struct CboeVolatilitySource {
    client: Client,
    url: String,
}

impl CboeVolatilitySource {
    pub fn new() -> Result<Self, DataError> {
        Self::with_url(VIX_HISTORY_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, DataError> {
        Ok(Self {
            client: http::build_client()?,
            url: url.into(),
        })
    }
}

impl VolatilitySource for CboeVolatilitySource {
    fn name(&self) -> &str {
        "cboe"
    }

    fn acquire(&self, dest: &Path) -> Result<(), DataError> {
        let resp = http::get(&self.client, &self.url, "cboe volatility history")?.ok_or_else(
            || DataError::Http {
                status: 404,
                context: self.url.clone(),
            },
        )?;
        let body = resp
            .bytes()
            .map_err(|e| {
                DataError::NetworkUnreachable(format!("reading body: {}", e.without_url()))
            })?;

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path(dest);
        fs::write(&tmp, &body)?;
        fs::rename(&tmp, dest).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            DataError::Io(e)
        })?;

        info!(path = %dest.display(), bytes = body.len(), "volatility history downloaded");
        Ok(())
    }
}

/// `<path>.tmp`, next to the target.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%m/%d/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Load the series from a CBOE-style CSV, sorted by date.
///
/// `value` is the CLOSE column. Rows with an unparseable date or close are
/// skipped with a warning.
pub fn load_series(path: &Path) -> Result<Vec<VolatilityPoint>, DataError> {
    if !path.exists() {
        return Err(DataError::MissingResource {
            path: path.to_path_buf(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| DataError::Csv(format!("{}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| DataError::Csv(format!("reading headers: {e}")))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| DataError::Csv(format!("missing column '{name}' in {}", path.display())))
    };
    let date_idx = column("DATE")?;
    let close_idx = column("CLOSE")?;

    let mut points = Vec::new();
    let mut skipped = 0usize;
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| DataError::Csv(format!("line {}: {e}", idx + 2)))?;
        let date = record.get(date_idx).and_then(parse_date);
        let close = record.get(close_idx).and_then(|v| v.parse::<f64>().ok());
        match (date, close) {
            (Some(date), Some(value)) => points.push(VolatilityPoint { date, value }),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, path = %path.display(), "skipped unparseable volatility rows");
    }

    points.sort_by_key(|p| p.date);
    Ok(points)
}

/// Make sure the series file exists, downloading it if absent or when
/// `refresh` is set, then load it.
///
/// A failed download falls back to an existing file. Without one the run
/// cannot attach volatility and gets `MissingResource`.
pub fn ensure_series(
    source: &dyn VolatilitySource,
    path: &Path,
    refresh: bool,
) -> Result<Vec<VolatilityPoint>, DataError> {
    if refresh || !path.exists() {
        if let Err(e) = source.acquire(path) {
            warn!(source = source.name(), error = %e, "volatility download failed");
        }
    }
    load_series(path)
}
