//! Bucketing observations by dimension and time.

use std::collections::BTreeMap;

use gourdwatch_core::TaxonomyLookup;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::observation::Observation;
use crate::series::{success_rate, time_series, SeriesPoint};
use crate::time::{TimeBucket, TimeKey};
use crate::UNKNOWN_LABEL;

/// A grouping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// Plot number
    Plot,
    /// Gourd type name
    GourdType,
    /// Variety name
    Variety,
}

impl Dimension {
    /// Parse "plot", "type"/"gourd-type", "variety".
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "plot" | "plotno" => Some(Dimension::Plot),
            "type" | "gourdtype" => Some(Dimension::GourdType),
            "variety" => Some(Dimension::Variety),
            _ => None,
        }
    }

    /// Label of `obs` along this dimension.
    pub fn label_of(&self, obs: &Observation, taxonomy: &dyn TaxonomyLookup) -> String {
        let label = match self {
            Dimension::Plot => obs.plot_no.as_deref(),
            Dimension::GourdType => obs
                .gourd_type
                .as_ref()
                .and_then(|id| taxonomy.resolve_gourd_type(id)),
            Dimension::Variety => obs
                .variety
                .as_ref()
                .and_then(|id| taxonomy.resolve_variety(id)),
        };
        label.unwrap_or(UNKNOWN_LABEL).to_string()
    }
}

/// Labels along the chosen dimensions, in the order they were requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DimensionKey(pub Vec<String>);

impl DimensionKey {
    /// Joined display label; "All" when grouping on no dimension.
    pub fn label(&self) -> String {
        if self.0.is_empty() {
            "All".to_string()
        } else {
            self.0.join(" / ")
        }
    }
}

/// Sums for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Pollinated flowers
    pub pollinated: usize,
    /// Harvested fruit from finalized records
    pub harvested: usize,
}

impl Metrics {
    /// Fold one observation in.
    pub fn add(&mut self, obs: &Observation) {
        self.pollinated += obs.pollinated;
        self.harvested += obs.counted_harvest();
    }

    /// Merge another bucket.
    pub fn merge(&mut self, other: &Metrics) {
        self.pollinated += other.pollinated;
        self.harvested += other.harvested;
    }

    /// Success rate of this bucket.
    pub fn success_rate(&self) -> f64 {
        success_rate(self.pollinated, self.harvested)
    }
}

/// Result of [`group_by`].
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// Metrics by dimension key, then by time key
    pub buckets: BTreeMap<DimensionKey, BTreeMap<TimeKey, Metrics>>,

    /// Observations whose fields were normalized to defaults
    pub excluded_count: usize,
}

/// One dimension key's time series.
#[derive(Debug, Clone, Serialize)]
pub struct Breakdown {
    /// Dimension labels
    pub key: DimensionKey,
    /// Joined label
    pub label: String,
    /// Ordered series
    pub series: Vec<SeriesPoint>,
    /// Sum over the series
    pub totals: Metrics,
    /// Rate over the totals
    pub success_rate: f64,
}

/// One row of a success-rate table.
#[derive(Debug, Clone, Serialize)]
pub struct RateRow {
    /// Dimension labels
    pub key: DimensionKey,
    /// Joined label
    pub label: String,
    /// Pollinated flowers
    pub pollinated: usize,
    /// Harvested fruit
    pub harvested: usize,
    /// Success percentage
    pub success_rate: f64,
}

impl Grouping {
    /// Sum over every bucket.
    pub fn totals(&self) -> Metrics {
        let mut totals = Metrics::default();
        for series in self.buckets.values() {
            for metrics in series.values() {
                totals.merge(metrics);
            }
        }
        totals
    }

    /// Time series per dimension key, keys in ascending order.
    pub fn breakdowns(&self) -> Vec<Breakdown> {
        self.buckets
            .iter()
            .map(|(key, series)| {
                let mut totals = Metrics::default();
                series.values().for_each(|m| totals.merge(m));
                Breakdown {
                    key: key.clone(),
                    label: key.label(),
                    series: time_series(series),
                    success_rate: totals.success_rate(),
                    totals,
                }
            })
            .collect()
    }

    /// Collapse time; best success rate first, ties by label.
    pub fn rate_table(&self) -> Vec<RateRow> {
        let mut rows: Vec<RateRow> = self
            .breakdowns()
            .into_iter()
            .map(|b| RateRow {
                key: b.key,
                label: b.label,
                pollinated: b.totals.pollinated,
                harvested: b.totals.harvested,
                success_rate: b.success_rate,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.success_rate
                .partial_cmp(&a.success_rate)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.label.cmp(&b.label))
        });
        rows
    }
}

/// Bucket observations by `dims` × `bucket`.
///
/// Pollinated counts are always summed; harvested counts only for
/// finalized observations. Never fails: unresolved labels become "Unknown".
pub fn group_by(
    observations: &[Observation],
    dims: &[Dimension],
    bucket: TimeBucket,
    taxonomy: &dyn TaxonomyLookup,
) -> Grouping {
    let mut grouping = Grouping::default();

    for obs in observations {
        if obs.normalized {
            grouping.excluded_count += 1;
        }
        let key = DimensionKey(dims.iter().map(|d| d.label_of(obs, taxonomy)).collect());
        let time = bucket.key(obs.date_of_pollination);
        grouping
            .buckets
            .entry(key)
            .or_default()
            .entry(time)
            .or_default()
            .add(obs);
    }

    debug!(
        "Grouped {} observations into {} keys ({} normalized)",
        observations.len(),
        grouping.buckets.len(),
        grouping.excluded_count
    );
    grouping
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use gourdwatch_core::{GourdType, GourdTypeId, RecordStatus, Taxonomy};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(
        plot: Option<&str>,
        gourd_type: Option<GourdTypeId>,
        day: NaiveDate,
        pollinated: usize,
        harvested: usize,
        status: RecordStatus,
    ) -> Observation {
        Observation {
            plot_no: plot.map(str::to_string),
            gourd_type,
            variety: None,
            date_of_pollination: Some(day),
            pollinated,
            harvested,
            status,
            normalized: false,
        }
    }

    #[test]
    fn test_same_week_same_plot_sums() {
        let bottle = GourdType::new("Bottle", "");
        let taxonomy = Taxonomy::from_parts(vec![bottle.clone()], vec![]);
        let observations = vec![
            obs(Some("P1"), Some(bottle.id), date(2024, 1, 8), 2, 0, RecordStatus::Pending),
            obs(Some("P1"), Some(bottle.id), date(2024, 1, 9), 3, 0, RecordStatus::Pending),
            obs(Some("P1"), Some(bottle.id), date(2024, 1, 10), 4, 0, RecordStatus::Pending),
        ];

        let grouping = group_by(
            &observations,
            &[Dimension::Plot, Dimension::GourdType],
            TimeBucket::Week,
            &taxonomy,
        );
        let key = DimensionKey(vec!["P1".into(), "Bottle".into()]);
        let week = TimeKey::Week { year: 2024, week: 2 };
        assert_eq!(grouping.buckets[&key][&week].pollinated, 9);
        assert_eq!(grouping.buckets.len(), 1);
    }

    #[test]
    fn test_pollinated_is_conserved() {
        let taxonomy = Taxonomy::new();
        let observations = vec![
            obs(Some("A"), None, date(2024, 1, 1), 5, 5, RecordStatus::Completed),
            obs(None, None, date(2024, 2, 10), 3, 1, RecordStatus::Failed),
            obs(Some("B"), Some(GourdTypeId::new()), date(2023, 12, 31), 4, 2, RecordStatus::InProgress),
        ];
        let expected: usize = observations.iter().map(|o| o.pollinated).sum();

        for bucket in [TimeBucket::Week, TimeBucket::Month] {
            let grouping = group_by(&observations, &[Dimension::Plot, Dimension::Variety], bucket, &taxonomy);
            assert_eq!(grouping.totals().pollinated, expected);
        }
    }

    #[test]
    fn test_harvest_only_from_finalized() {
        let taxonomy = Taxonomy::new();
        let observations = vec![
            obs(Some("A"), None, date(2024, 1, 1), 5, 5, RecordStatus::Completed),
            obs(Some("A"), None, date(2024, 1, 2), 4, 3, RecordStatus::InProgress),
            obs(Some("A"), None, date(2024, 1, 3), 4, 1, RecordStatus::Failed),
        ];
        let grouping = group_by(&observations, &[Dimension::Plot], TimeBucket::Month, &taxonomy);
        let totals = grouping.totals();
        assert_eq!(totals.pollinated, 13);
        assert_eq!(totals.harvested, 6);
    }

    #[test]
    fn test_unresolved_labels_are_unknown() {
        let taxonomy = Taxonomy::new();
        let observations = vec![obs(None, Some(GourdTypeId::new()), date(2024, 1, 1), 1, 0, RecordStatus::Pending)];
        let grouping = group_by(
            &observations,
            &[Dimension::Plot, Dimension::GourdType, Dimension::Variety],
            TimeBucket::Week,
            &taxonomy,
        );
        let key = grouping.buckets.keys().next().unwrap();
        assert_eq!(key.0, vec!["Unknown", "Unknown", "Unknown"]);
        assert_eq!(key.label(), "Unknown / Unknown / Unknown");
    }

    #[test]
    fn test_normalized_observations_counted_not_dropped() {
        let taxonomy = Taxonomy::new();
        let mut broken = obs(None, None, date(2024, 1, 1), 2, 0, RecordStatus::Pending);
        broken.normalized = true;
        broken.date_of_pollination = None;
        let observations = vec![broken, obs(Some("A"), None, date(2024, 1, 1), 1, 0, RecordStatus::Pending)];

        let grouping = group_by(&observations, &[], TimeBucket::Week, &taxonomy);
        assert_eq!(grouping.excluded_count, 1);
        assert_eq!(grouping.totals().pollinated, 3);
        let series = &grouping.buckets[&DimensionKey(vec![])];
        assert!(series.contains_key(&TimeKey::Undated));
    }

    #[test]
    fn test_rate_table_ordering() {
        let taxonomy = Taxonomy::new();
        let observations = vec![
            obs(Some("B"), None, date(2024, 1, 1), 4, 2, RecordStatus::Failed),
            obs(Some("A"), None, date(2024, 1, 1), 4, 2, RecordStatus::Failed),
            obs(Some("C"), None, date(2024, 1, 1), 2, 2, RecordStatus::Completed),
            obs(Some("D"), None, date(2024, 1, 1), 0, 0, RecordStatus::Pending),
        ];
        let grouping = group_by(&observations, &[Dimension::Plot], TimeBucket::Week, &taxonomy);
        let labels: Vec<_> = grouping.rate_table().into_iter().map(|r| (r.label, r.success_rate)).collect();
        assert_eq!(
            labels,
            vec![
                ("C".to_string(), 100.0),
                ("A".to_string(), 50.0),
                ("B".to_string(), 50.0),
                ("D".to_string(), 0.0),
            ]
        );
    }

    #[test]
    fn test_dimension_parse() {
        assert_eq!(Dimension::parse("plot"), Some(Dimension::Plot));
        assert_eq!(Dimension::parse("gourd-type"), Some(Dimension::GourdType));
        assert_eq!(Dimension::parse("Variety"), Some(Dimension::Variety));
        assert_eq!(Dimension::parse("farm"), None);
    }
}
