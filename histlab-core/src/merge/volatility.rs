//! Align the volatility index series with the dataset's day offsets.

use super::rename::offset_column;
use crate::data::provider::DataError;
use crate::domain::{Table, VolatilityPoint};
use chrono::Duration;
use tracing::{debug, info};

/// Column stem for attached index closes.
pub const VIX_CLOSE: &str = "vix_close";

/// Suffix of `series` starting at the first point on or after
/// `lookback_start`. `series` must be sorted by date.
pub fn slice(
    series: &[VolatilityPoint],
    lookback_start: chrono::NaiveDate,
) -> Result<&[VolatilityPoint], DataError> {
    let first = series.partition_point(|p| p.date < lookback_start);
    if first == series.len() {
        return Err(DataError::Alignment {
            start: lookback_start,
        });
    }
    Ok(&series[first..])
}

/// Add one `vix_close_<offset>_days_before` column per merged offset,
/// broadcasting the index close of `reference - offset` to every row.
///
/// Offsets with no point in `series` (market holidays, gaps in the file) are
/// skipped. Returns the number of columns attached.
pub fn attach(table: &mut Table, series: &[VolatilityPoint], reference: chrono::NaiveDate) -> usize {
    let offsets: Vec<i64> = table.offsets().iter().copied().collect();
    let rows = table.row_count();
    let mut attached = 0;
    let mut missing = 0;

    for offset in offsets {
        let date = reference - Duration::days(offset);
        let point = series
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| series[i]);
        match point {
            Some(p) => {
                table.insert_column(offset_column(VIX_CLOSE, offset), vec![Some(p.value); rows]);
                attached += 1;
            }
            None => {
                debug!(offset, %date, "no volatility point for offset");
                missing += 1;
            }
        }
    }

    info!(attached, missing, "volatility columns attached");
    attached
}
