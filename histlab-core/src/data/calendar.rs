//! Calendar date ranges for the lookback window.
//!
//! The window start is computed with date arithmetic (`today - N days`), so
//! year and century boundaries and leap days need no special handling.

use chrono::{Duration, NaiveDate};

/// Default lookback: two years of calendar days.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 730;

/// ISO format used for dates in provider queries.
pub const ISO_DATE: &str = "%Y-%m-%d";

/// Inclusive, ascending range of calendar dates.
///
/// The range is a value; each call to `iter()` restarts from `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Range from `start` to `end` inclusive. Empty when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// The window of `days` calendar days before `today`, through `today`.
    pub fn lookback(today: NaiveDate, days: u32) -> Self {
        Self::new(today - Duration::days(i64::from(days)), today)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// The most recent date; day offsets are counted back from it.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn len(&self) -> usize {
        if self.start > self.end {
            0
        } else {
            ((self.end - self.start).num_days() + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn iter(&self) -> DateIter {
        DateIter {
            next: (!self.is_empty()).then_some(self.start),
            end: self.end,
        }
    }
}

impl IntoIterator for DateRange {
    type Item = NaiveDate;
    type IntoIter = DateIter;

    fn into_iter(self) -> DateIter {
        self.iter()
    }
}

impl IntoIterator for &DateRange {
    type Item = NaiveDate;
    type IntoIter = DateIter;

    fn into_iter(self) -> DateIter {
        self.iter()
    }
}

/// Lazy iterator over a `DateRange`.
#[derive(Debug, Clone)]
pub struct DateIter {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DateIter {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        self.next = current.succ_opt().filter(|d| *d <= self.end);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self
            .next
            .map(|d| ((self.end - d).num_days() + 1) as usize)
            .unwrap_or(0);
        (n, Some(n))
    }
}

impl ExactSizeIterator for DateIter {}
