//! Success rates and ordered time series.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::group::Metrics;
use crate::time::TimeKey;

/// Harvested over pollinated as a percentage, rounded to 2 decimals.
///
/// Zero pollinated yields 0, never NaN or infinity.
pub fn success_rate(pollinated: usize, harvested: usize) -> f64 {
    if pollinated == 0 {
        return 0.0;
    }
    let rate = harvested as f64 / pollinated as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}

/// One point of a chart series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Time key
    pub key: TimeKey,
    /// Display label
    pub label: String,
    /// Pollinated flowers
    pub pollinated: usize,
    /// Harvested fruit
    pub harvested: usize,
    /// Success percentage
    pub success_rate: f64,
}

/// Flatten a bucket map into points ordered by (year, week|month).
///
/// The order comes from the map: `TimeKey`'s ordering is numeric.
pub fn time_series(buckets: &BTreeMap<TimeKey, Metrics>) -> Vec<SeriesPoint> {
    buckets
        .iter()
        .map(|(key, metrics)| SeriesPoint {
            key: *key,
            label: key.label(),
            pollinated: metrics.pollinated,
            harvested: metrics.harvested,
            success_rate: metrics.success_rate(),
        })
        .collect()
}
