//! Aggregation engine
//!
//! Buckets monitoring records by plot, gourd type, variety and time window,
//! and computes the sums and success rates dashboards chart.

#![warn(missing_docs)]

pub mod time;
pub mod observation;
pub mod group;
pub mod series;

pub use time::{month_key, week_key, TimeBucket, TimeKey};
pub use observation::{observe, observe_documents, Observation};
pub use group::{group_by, Breakdown, Dimension, DimensionKey, Grouping, Metrics, RateRow};
pub use series::{success_rate, time_series, SeriesPoint};

/// Label used for any dimension or time value that cannot be resolved.
pub const UNKNOWN_LABEL: &str = "Unknown";
