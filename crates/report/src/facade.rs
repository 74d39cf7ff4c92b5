//! Canonical dashboard queries over already-loaded records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use gourdwatch_aggregation::{
    group_by, observe, success_rate, Breakdown, Dimension, Observation, RateRow, TimeBucket,
};
use gourdwatch_core::{classify_status, is_due_today, MonitoringRecord, RecordStatus, TaxonomyLookup};
use serde::{Deserialize, Serialize};

/// Headline numbers for a set of records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Number of records
    pub total: usize,
    /// Pollinated flowers across all records
    pub total_pollinated: usize,
    /// Harvested fruit across finalized records
    pub total_harvested: usize,
    /// Harvested over pollinated, percent
    pub success_rate: f64,
    /// Pollinated flowers without a counted harvest
    pub failed_count: usize,
}

/// Summarize records as of `today`.
pub fn summary(records: &[MonitoringRecord], today: NaiveDate) -> Summary {
    summarize(&observe(records, today))
}

/// Summarize observations.
pub fn summarize(observations: &[Observation]) -> Summary {
    let total_pollinated: usize = observations.iter().map(|o| o.pollinated).sum();
    let total_harvested: usize = observations.iter().map(Observation::counted_harvest).sum();
    Summary {
        total: observations.len(),
        total_pollinated,
        total_harvested,
        success_rate: success_rate(total_pollinated, total_harvested),
        failed_count: total_pollinated.saturating_sub(total_harvested),
    }
}

/// Weekly series per dimension key.
pub fn weekly_breakdown(
    records: &[MonitoringRecord],
    dims: &[Dimension],
    today: NaiveDate,
    taxonomy: &dyn TaxonomyLookup,
) -> Vec<Breakdown> {
    breakdown(&observe(records, today), dims, TimeBucket::Week, taxonomy)
}

/// Monthly series per dimension key.
pub fn monthly_breakdown(
    records: &[MonitoringRecord],
    dims: &[Dimension],
    today: NaiveDate,
    taxonomy: &dyn TaxonomyLookup,
) -> Vec<Breakdown> {
    breakdown(&observe(records, today), dims, TimeBucket::Month, taxonomy)
}

/// Series per dimension key for any time bucket.
pub fn breakdown(
    observations: &[Observation],
    dims: &[Dimension],
    bucket: TimeBucket,
    taxonomy: &dyn TaxonomyLookup,
) -> Vec<Breakdown> {
    group_by(observations, dims, bucket, taxonomy).breakdowns()
}

/// Success-rate table along `dims`, best first.
pub fn success_rates(
    records: &[MonitoringRecord],
    dims: &[Dimension],
    today: NaiveDate,
    taxonomy: &dyn TaxonomyLookup,
) -> Vec<RateRow> {
    rate_table(&observe(records, today), dims, taxonomy)
}

/// Success-rate table over observations.
pub fn rate_table(
    observations: &[Observation],
    dims: &[Dimension],
    taxonomy: &dyn TaxonomyLookup,
) -> Vec<RateRow> {
    group_by(observations, dims, TimeBucket::Week, taxonomy).rate_table()
}

/// Records with a harvest date on `today`.
pub fn due_today(records: &[MonitoringRecord], today: NaiveDate) -> Vec<&MonitoringRecord> {
    records.iter().filter(|r| is_due_today(r, today)).collect()
}

/// Records whose classified status on `today` is `status`.
pub fn with_status(
    records: &[MonitoringRecord],
    status: RecordStatus,
    today: NaiveDate,
) -> Vec<&MonitoringRecord> {
    records
        .iter()
        .filter(|r| classify_status(r, today) == status)
        .collect()
}

/// Number of records per classified status. Every status is present.
pub fn status_counts(observations: &[Observation]) -> BTreeMap<RecordStatus, usize> {
    let mut counts: BTreeMap<RecordStatus, usize> =
        RecordStatus::ALL.iter().map(|s| (*s, 0)).collect();
    for obs in observations {
        *counts.entry(obs.status).or_default() += 1;
    }
    counts
}
