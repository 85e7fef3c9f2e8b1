//! End-to-end dataset builds against in-memory providers.

use chrono::NaiveDate;
use histlab_core::cancel::{CancellationToken, Cancelled};
use histlab_core::data::{
    DataError, FundamentalsProvider, MarketDataProvider, Pause, Query, VolatilitySource,
};
use histlab_core::domain::{AggregateRecord, AggregateResponse, FinancialsRecord};
use histlab_runner::{
    build_dataset, LogProgress, PipelineConfig, PipelineError, RunOptions, Sources,
};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

/// Grouped-daily responses keyed by ISO date. Dates not in the map fail.
struct MockMarket {
    days: HashMap<String, Vec<(&'static str, f64)>>,
    /// Answer every unknown date with this ticker instead of failing.
    fallback: Option<&'static str>,
    calls: Mutex<Vec<String>>,
}

impl MockMarket {
    fn new(days: &[(NaiveDate, Vec<(&'static str, f64)>)]) -> Self {
        Self {
            days: days
                .iter()
                .map(|(date, rows)| (date.format("%Y-%m-%d").to_string(), rows.clone()))
                .collect(),
            fallback: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn every_day(ticker: &'static str) -> Self {
        Self {
            days: HashMap::new(),
            fallback: Some(ticker),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl MarketDataProvider for MockMarket {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_aggregate(&self, query: &Query) -> Result<AggregateResponse, DataError> {
        let date = query.get("date").unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(date.clone());

        let rows = match (self.days.get(&date), self.fallback) {
            (Some(rows), _) => rows.clone(),
            (None, Some(ticker)) => vec![(ticker, 1.0)],
            (None, None) => {
                return Err(DataError::Http {
                    status: 500,
                    context: date,
                })
            }
        };
        Ok(AggregateResponse::new(
            rows.into_iter()
                .map(|(ticker, close)| AggregateRecord {
                    close: Some(close),
                    volume: Some(1_000.0),
                    ..AggregateRecord::empty(ticker)
                })
                .collect(),
        ))
    }
}

struct MockFundamentals(HashMap<&'static str, BTreeMap<String, Option<f64>>>);

impl FundamentalsProvider for MockFundamentals {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch_financials(&self, ticker: &str) -> Result<FinancialsRecord, DataError> {
        self.0
            .get(ticker)
            .cloned()
            .map(|m| FinancialsRecord::new(ticker, m))
            .ok_or_else(|| DataError::Other(format!("unknown ticker {ticker}")))
    }
}

fn metrics(range: std::ops::Range<usize>) -> BTreeMap<String, Option<f64>> {
    range.map(|i| (format!("metric_{i:03}"), Some(i as f64))).collect()
}

/// Records waits without sleeping.
#[derive(Default)]
struct RecordingPause {
    waits: Mutex<Vec<Duration>>,
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        cancel.check()?;
        self.waits.lock().unwrap().push(duration);
        Ok(())
    }
}

/// Raises the token the first time the pipeline has to wait.
struct CancelOnPause;

impl Pause for CancelOnPause {
    fn pause(&self, _duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        cancel.cancel();
        cancel.check()
    }
}

struct FileVolatility(&'static str);

impl VolatilitySource for FileVolatility {
    fn name(&self) -> &str {
        "file"
    }

    fn acquire(&self, dest: &Path) -> Result<(), DataError> {
        Ok(std::fs::write(dest, self.0)?)
    }
}

fn config(lookback_days: u32) -> PipelineConfig {
    PipelineConfig {
        lookback_days,
        ..PipelineConfig::default()
    }
}

fn market_only<'a>(market: &'a dyn MarketDataProvider, pause: &'a dyn Pause) -> Sources<'a> {
    Sources {
        market,
        fundamentals: None,
        volatility: None,
        pause,
    }
}

// ──────────────────────────────────────────────
// Aggregates
// ──────────────────────────────────────────────

#[test]
fn two_days_fold_into_one_row_with_offset_columns() {
    let d2 = d(2024, 3, 5);
    let d1 = d(2024, 3, 4);
    let market = MockMarket::new(&[(d1, vec![("X", 10.0)]), (d2, vec![("X", 11.0)])]);
    let pause = RecordingPause::default();

    let run = build_dataset(
        &config(1),
        &market_only(&market, &pause),
        &RunOptions::new(d2),
        &CancellationToken::new(),
        &LogProgress,
    )
    .unwrap();

    assert!(run.summary.completed);
    assert_eq!(run.summary.batches_merged, 2);
    assert_eq!(run.table.tickers(), &["X".to_string()]);
    assert_eq!(run.table.get("X", "close_price_1_days_before"), Some(10.0));
    assert_eq!(run.table.get("X", "close_price_0_days_before"), Some(11.0));
    assert_eq!(run.table.column_count(), 14);
    assert!(!run.table.has_column("unix_timestamp_0_days_before"));
}

#[test]
fn empty_and_failed_days_are_skipped() {
    let today = d(2024, 1, 8); // Monday
    let market = MockMarket::new(&[
        (d(2024, 1, 5), vec![("A", 1.0), ("B", 2.0)]),
        (d(2024, 1, 6), vec![]),
        (d(2024, 1, 7), vec![]),
        (today, vec![("B", 3.0), ("A", 4.0)]),
    ]);
    let pause = RecordingPause::default();

    // 01-04 is not in the mock and fails with HTTP 500.
    let run = build_dataset(
        &config(4),
        &market_only(&market, &pause),
        &RunOptions::new(today),
        &CancellationToken::new(),
        &LogProgress,
    )
    .unwrap();

    assert_eq!(run.summary.batches_total, 5);
    assert_eq!(run.summary.batches_failed, 1);
    assert_eq!(run.summary.batches_empty, 2);
    assert_eq!(run.summary.batches_merged, 2);
    assert_eq!(run.table.get("A", "close_price_0_days_before"), Some(4.0));
    assert_eq!(run.table.get("B", "close_price_3_days_before"), Some(2.0));
    assert_eq!(run.table.offsets().iter().copied().collect::<Vec<_>>(), vec![0, 3]);
}

#[test]
fn quota_forces_a_pause_every_five_calls() {
    let market = MockMarket::every_day("X");
    let pause = RecordingPause::default();

    let run = build_dataset(
        &config(11),
        &market_only(&market, &pause),
        &RunOptions::new(d(2024, 6, 30)),
        &CancellationToken::new(),
        &LogProgress,
    )
    .unwrap();

    // 12 calls: pauses before the 6th and the 11th.
    assert_eq!(market.call_count(), 12);
    assert_eq!(run.summary.pauses, 2);
    assert_eq!(pause.waits.lock().unwrap().len(), 2);
}

// ──────────────────────────────────────────────
// Cancellation
// ──────────────────────────────────────────────

#[test]
fn cancel_during_first_pause_returns_five_batches() {
    let market = MockMarket::every_day("X");
    let cancel = CancellationToken::new();

    let run = build_dataset(
        &PipelineConfig::default(),
        &market_only(&market, &CancelOnPause),
        &RunOptions::new(d(2024, 6, 30)),
        &cancel,
        &LogProgress,
    )
    .unwrap();

    assert!(cancel.is_cancelled());
    assert!(!run.summary.completed);
    assert_eq!(market.call_count(), 5);
    assert_eq!(run.summary.batches_merged, 5);
    assert_eq!(run.table.row_count(), 1);
    assert_eq!(run.table.offsets().len(), 5);
    assert_eq!(run.table.column_count(), 5 * 7);
    // The oldest five days of the 731-day window.
    assert!(run.table.has_column("close_price_730_days_before"));
    assert!(run.table.has_column("close_price_726_days_before"));
}

#[test]
fn cancelled_run_skips_later_stages() {
    let market = MockMarket::every_day("X");
    let fundamentals = MockFundamentals(HashMap::from([("X", metrics(0..100))]));
    let cancel = CancellationToken::new();

    let run = build_dataset(
        &config(30),
        &Sources {
            market: &market,
            fundamentals: Some(&fundamentals),
            volatility: Some(&FileVolatility("")),
            pause: &CancelOnPause,
        },
        &RunOptions::new(d(2024, 6, 30)),
        &cancel,
        &LogProgress,
    )
    .unwrap();

    assert!(!run.summary.completed);
    assert!(run.summary.reconcile.is_none());
    assert!(run.summary.volatility_columns.is_none());
}

/// Raises the token while answering the query for `date`.
struct CancelDuringFetch {
    inner: MockMarket,
    date: &'static str,
    cancel: CancellationToken,
}

impl MarketDataProvider for CancelDuringFetch {
    fn name(&self) -> &str {
        "cancel-during-fetch"
    }

    fn fetch_aggregate(&self, query: &Query) -> Result<AggregateResponse, DataError> {
        if query.get("date") == Some(self.date) {
            self.cancel.cancel();
        }
        self.inner.fetch_aggregate(query)
    }
}

/// Counts download attempts.
#[derive(Default)]
struct CountingVolatility {
    acquired: Mutex<usize>,
}

impl VolatilitySource for CountingVolatility {
    fn name(&self) -> &str {
        "counting"
    }

    fn acquire(&self, dest: &Path) -> Result<(), DataError> {
        *self.acquired.lock().unwrap() += 1;
        Ok(std::fs::write(dest, VIX_CSV)?)
    }
}

#[test]
fn cancel_during_last_fetch_skips_volatility_download() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let market = CancelDuringFetch {
        inner: MockMarket::every_day("X"),
        date: "2024-03-05",
        cancel: cancel.clone(),
    };
    let volatility = CountingVolatility::default();
    let pause = RecordingPause::default();
    let mut cfg = config(2);
    cfg.volatility.path = dir.path().join("VIX_History.csv");

    let run = build_dataset(
        &cfg,
        &Sources {
            market: &market,
            fundamentals: None,
            volatility: Some(&volatility),
            pause: &pause,
        },
        &RunOptions {
            skip_financials: true,
            ..RunOptions::new(d(2024, 3, 5))
        },
        &cancel,
        &LogProgress,
    )
    .unwrap();

    assert!(!run.summary.completed);
    assert_eq!(run.summary.batches_merged, 3);
    assert!(run.summary.volatility_columns.is_none());
    assert_eq!(*volatility.acquired.lock().unwrap(), 0);
    assert!(!cfg.volatility.path.exists());
}

// ──────────────────────────────────────────────
// Fundamentals
// ──────────────────────────────────────────────

#[test]
fn fundamentals_narrow_to_shared_metrics() {
    let today = d(2024, 3, 5);
    let market = MockMarket::new(&[
        (d(2024, 3, 4), vec![("A", 1.0), ("B", 2.0), ("C", 3.0)]),
        (today, vec![("A", 1.5), ("B", 2.5), ("C", 3.5)]),
    ]);
    // A: 0..120, B: 40..140 (80 shared with A), C: too few metrics.
    let fundamentals = MockFundamentals(HashMap::from([
        ("A", metrics(0..120)),
        ("B", metrics(40..140)),
        ("C", metrics(0..10)),
    ]));
    let pause = RecordingPause::default();

    let run = build_dataset(
        &config(1),
        &Sources {
            market: &market,
            fundamentals: Some(&fundamentals),
            volatility: None,
            pause: &pause,
        },
        &RunOptions::new(today),
        &CancellationToken::new(),
        &LogProgress,
    )
    .unwrap();

    let report = run.summary.reconcile.unwrap();
    assert_eq!(report.accepted, 2);
    assert_eq!(report.discarded, 1);
    assert_eq!(report.metric_columns.len(), 80);
    assert_eq!(run.table.tickers(), &["A".to_string(), "B".to_string()]);
    assert_eq!(run.table.column_count(), 14 + 80);
    assert_eq!(run.table.get("B", "metric_100"), Some(100.0));
    assert_eq!(run.table.get("A", "close_price_0_days_before"), Some(1.5));
}

#[test]
fn max_tickers_option_overrides_config() {
    let today = d(2024, 3, 5);
    let market = MockMarket::new(&[
        (d(2024, 3, 4), vec![("A", 1.0), ("B", 2.0), ("C", 3.0)]),
        (today, vec![("A", 1.0), ("B", 2.0), ("C", 3.0)]),
    ]);
    let fundamentals = MockFundamentals(HashMap::from([
        ("A", metrics(0..100)),
        ("B", metrics(0..100)),
        ("C", metrics(0..100)),
    ]));
    let pause = RecordingPause::default();
    let mut cfg = config(1);
    cfg.fundamentals.max_tickers = Some(3);

    let run = build_dataset(
        &cfg,
        &Sources {
            market: &market,
            fundamentals: Some(&fundamentals),
            volatility: None,
            pause: &pause,
        },
        &RunOptions {
            max_tickers: Some(1),
            ..RunOptions::new(today)
        },
        &CancellationToken::new(),
        &LogProgress,
    )
    .unwrap();

    assert_eq!(run.summary.reconcile.unwrap().processed, 1);
    assert_eq!(run.table.get("A", "metric_000"), Some(0.0));
    assert_eq!(run.table.get("B", "metric_000"), None);
}

#[test]
fn skip_financials_leaves_market_columns_only() {
    let today = d(2024, 3, 5);
    let market = MockMarket::every_day("X");
    let fundamentals = MockFundamentals(HashMap::from([("X", metrics(0..100))]));
    let pause = RecordingPause::default();

    let run = build_dataset(
        &config(1),
        &Sources {
            market: &market,
            fundamentals: Some(&fundamentals),
            volatility: None,
            pause: &pause,
        },
        &RunOptions {
            skip_financials: true,
            ..RunOptions::new(today)
        },
        &CancellationToken::new(),
        &LogProgress,
    )
    .unwrap();

    assert!(run.summary.reconcile.is_none());
    assert_eq!(run.table.column_count(), 14);
}

// ──────────────────────────────────────────────
// Volatility
// ──────────────────────────────────────────────

const VIX_CSV: &str = "DATE,OPEN,HIGH,LOW,CLOSE\n\
    03/01/2024,13.5,13.9,13.0,13.11\n\
    03/04/2024,13.4,13.7,13.2,13.49\n\
    03/05/2024,13.6,14.5,13.5,14.46\n";

#[test]
fn volatility_columns_follow_merged_offsets() {
    let dir = tempfile::tempdir().unwrap();
    let today = d(2024, 3, 5);
    let market = MockMarket::every_day("X");
    let pause = RecordingPause::default();
    let mut cfg = config(4);
    cfg.volatility.path = dir.path().join("VIX_History.csv");

    let run = build_dataset(
        &cfg,
        &Sources {
            market: &market,
            fundamentals: None,
            volatility: Some(&FileVolatility(VIX_CSV)),
            pause: &pause,
        },
        &RunOptions::new(today),
        &CancellationToken::new(),
        &LogProgress,
    )
    .unwrap();

    // Offsets 0..=4; the series has 03-05 (0), 03-04 (1) and 03-01 (4).
    assert_eq!(run.summary.volatility_columns, Some(3));
    assert_eq!(run.table.get("X", "vix_close_0_days_before"), Some(14.46));
    assert_eq!(run.table.get("X", "vix_close_4_days_before"), Some(13.11));
    assert!(!run.table.has_column("vix_close_2_days_before"));
}

#[test]
fn series_ending_before_window_is_an_alignment_error() {
    let dir = tempfile::tempdir().unwrap();
    let market = MockMarket::every_day("X");
    let pause = RecordingPause::default();
    let mut cfg = config(2);
    cfg.volatility.path = dir.path().join("VIX_History.csv");

    let err = build_dataset(
        &cfg,
        &Sources {
            market: &market,
            fundamentals: None,
            volatility: Some(&FileVolatility(VIX_CSV)),
            pause: &pause,
        },
        &RunOptions::new(d(2025, 1, 10)),
        &CancellationToken::new(),
        &LogProgress,
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::Data(DataError::Alignment { .. })));
}

#[test]
fn invalid_config_is_rejected_before_any_fetch() {
    let market = MockMarket::every_day("X");
    let pause = RecordingPause::default();

    let err = build_dataset(
        &config(0),
        &market_only(&market, &pause),
        &RunOptions::new(d(2024, 1, 1)),
        &CancellationToken::new(),
        &LogProgress,
    )
    .unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(market.call_count(), 0);
}
