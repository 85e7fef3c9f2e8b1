//! Progress reporting for dataset builds.

use chrono::NaiveDate;
use histlab_core::data::{DataError, DateRange};
use histlab_core::merge::{MergeStats, ReconcileReport};
use tracing::{debug, info, warn};

use crate::pipeline::RunSummary;

/// What happened to one daily batch.
#[derive(Debug)]
pub enum BatchOutcome<'a> {
    Merged(MergeStats),
    /// No trading that day.
    Empty,
    Failed(&'a DataError),
}

/// Callbacks from `build_dataset`.
pub trait PipelineProgress {
    /// Called once before the first fetch.
    fn on_start(&self, range: &DateRange, total_batches: usize);

    /// Called after each daily batch.
    fn on_batch(&self, date: NaiveDate, index: usize, total: usize, outcome: &BatchOutcome<'_>);

    /// Called when fundamentals reconciliation finishes.
    fn on_reconciled(&self, report: &ReconcileReport);

    /// Called when the build ends, cancelled or not.
    fn on_complete(&self, summary: &RunSummary);
}

/// Progress reporter that writes through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl PipelineProgress for LogProgress {
    fn on_start(&self, range: &DateRange, total_batches: usize) {
        info!(
            start = %range.start(),
            end = %range.end(),
            batches = total_batches,
            "building dataset"
        );
    }

    fn on_batch(&self, date: NaiveDate, index: usize, total: usize, outcome: &BatchOutcome<'_>) {
        match outcome {
            BatchOutcome::Merged(stats) => info!(
                %date,
                batch = index + 1,
                total,
                matched = stats.matched_rows,
                "batch merged"
            ),
            BatchOutcome::Empty => debug!(%date, batch = index + 1, total, "no trading, skipped"),
            BatchOutcome::Failed(err) => warn!(
                %date,
                batch = index + 1,
                total,
                error = %err,
                "batch fetch failed, skipped"
            ),
        }
    }

    fn on_reconciled(&self, report: &ReconcileReport) {
        info!(
            accepted = report.accepted,
            discarded = report.discarded,
            metrics = report.metric_columns.len(),
            "fundamentals stage done"
        );
    }

    fn on_complete(&self, summary: &RunSummary) {
        if summary.completed {
            info!(
                rows = summary.rows,
                columns = summary.columns,
                merged = summary.batches_merged,
                "dataset complete"
            );
        } else {
            warn!(
                rows = summary.rows,
                columns = summary.columns,
                merged = summary.batches_merged,
                "run cancelled, returning partial dataset"
            );
        }
    }
}
