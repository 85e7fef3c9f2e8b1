//! Call-quota enforcement for rate-limited provider APIs.
//!
//! Providers allow N calls per fixed window (5/min for aggregates on the free
//! tier, 60/min for fundamentals). The limiter counts calls and, once the
//! budget for the current window is spent, suspends until the window resets.
//! That suspension is the only place the pipeline blocks, and it is where
//! cancellation is observed: a raised token aborts the wait instead of
//! sleeping it out.

use super::provider::{DataError, FundamentalsProvider, MarketDataProvider};
use super::query::Query;
use crate::cancel::{CancellationToken, Cancelled};
use crate::domain::{AggregateResponse, FinancialsRecord};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Calls allowed per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallQuota {
    pub calls: u32,
    pub window: Duration,
}

impl CallQuota {
    pub fn new(calls: u32, window: Duration) -> Self {
        Self { calls, window }
    }

    /// Aggregates endpoint: 5 calls per minute.
    pub fn aggregates() -> Self {
        Self::new(5, Duration::from_secs(60))
    }

    /// Fundamentals endpoint: 60 calls per minute.
    pub fn fundamentals() -> Self {
        Self::new(60, Duration::from_secs(60))
    }
}

/// A cancellable wait.
pub trait Pause {
    /// Wait for `duration`, returning early with `Cancelled` if `cancel` is
    /// raised before or during the wait.
    fn pause(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled>;
}

/// Sleeps on the current thread in short slices, checking the token between
/// slices.
#[derive(Debug, Clone, Copy)]
pub struct ThreadPause {
    slice: Duration,
}

impl ThreadPause {
    pub fn new(slice: Duration) -> Self {
        Self { slice }
    }
}

impl Default for ThreadPause {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Cancelled> {
        let deadline = Instant::now() + duration;
        loop {
            cancel.check()?;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(());
            }
            std::thread::sleep(remaining.min(self.slice));
        }
    }
}

/// Counts calls against a `CallQuota` and pauses when the window is spent.
pub struct RateLimiter<'a> {
    quota: CallQuota,
    pause: &'a dyn Pause,
    calls_in_window: u32,
    window_started: Option<Instant>,
    pauses: u32,
}

impl<'a> RateLimiter<'a> {
    pub fn new(quota: CallQuota, pause: &'a dyn Pause) -> Self {
        Self {
            quota,
            pause,
            calls_in_window: 0,
            window_started: None,
            pauses: 0,
        }
    }

    pub fn quota(&self) -> CallQuota {
        self.quota
    }

    /// True when the next call has to wait for the window to reset.
    pub fn is_exhausted(&self) -> bool {
        self.calls_in_window >= self.quota.calls
    }

    /// Number of pauses taken so far.
    pub fn pauses(&self) -> u32 {
        self.pauses
    }

    /// Reserve one call, pausing first if the window's budget is spent.
    pub fn acquire(&mut self, cancel: &CancellationToken) -> Result<(), Cancelled> {
        if self.is_exhausted() {
            let elapsed = self
                .window_started
                .map(|started| started.elapsed())
                .unwrap_or_default();
            let wait = self.quota.window.saturating_sub(elapsed);
            info!(
                calls = self.quota.calls,
                wait_secs = wait.as_secs_f64(),
                "call quota reached, pausing until the window resets"
            );
            self.pause.pause(wait, cancel)?;
            self.pauses += 1;
            self.calls_in_window = 0;
            self.window_started = None;
        }

        if self.window_started.is_none() {
            self.window_started = Some(Instant::now());
        }
        self.calls_in_window += 1;
        Ok(())
    }
}

/// What a rate-limited fetch produced.
#[derive(Debug)]
pub enum Fetched<T> {
    Data(T),
    /// The provider had nothing for this query (weekend, holiday). Skip it.
    Empty,
    /// The call failed. Not retried; the caller logs and skips.
    Failed(DataError),
}

/// Aggregate fetcher that respects a call quota.
pub struct RateLimitedFetcher<'a> {
    provider: &'a dyn MarketDataProvider,
    limiter: RateLimiter<'a>,
}

impl<'a> RateLimitedFetcher<'a> {
    pub fn new(provider: &'a dyn MarketDataProvider, limiter: RateLimiter<'a>) -> Self {
        Self { provider, limiter }
    }

    pub fn limiter(&self) -> &RateLimiter<'a> {
        &self.limiter
    }

    /// Fetch one query. `Err(Cancelled)` only if a quota pause was cancelled.
    pub fn fetch(
        &mut self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<Fetched<AggregateResponse>, Cancelled> {
        self.limiter.acquire(cancel)?;
        debug!(provider = self.provider.name(), path = %query.path(), "fetching aggregates");
        Ok(match self.provider.fetch_aggregate(query) {
            Ok(resp) if resp.is_empty() => Fetched::Empty,
            Ok(resp) => Fetched::Data(resp),
            Err(e) => Fetched::Failed(e),
        })
    }
}

/// Fundamentals fetcher that respects a call quota.
pub struct RateLimitedFundamentals<'a> {
    provider: &'a dyn FundamentalsProvider,
    limiter: RateLimiter<'a>,
}

impl<'a> RateLimitedFundamentals<'a> {
    pub fn new(provider: &'a dyn FundamentalsProvider, limiter: RateLimiter<'a>) -> Self {
        Self { provider, limiter }
    }

    pub fn limiter(&self) -> &RateLimiter<'a> {
        &self.limiter
    }

    pub fn fetch(
        &mut self,
        ticker: &str,
        cancel: &CancellationToken,
    ) -> Result<Fetched<FinancialsRecord>, Cancelled> {
        self.limiter.acquire(cancel)?;
        debug!(provider = self.provider.name(), ticker, "fetching financials");
        Ok(match self.provider.fetch_financials(ticker) {
            Ok(record) => Fetched::Data(record),
            Err(e) => Fetched::Failed(e),
        })
    }
}
