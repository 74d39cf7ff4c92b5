//! Report service - answers dashboard queries by reading through the stores.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use gourdwatch_aggregation::{
    observe_documents, Breakdown, Dimension, Observation, RateRow, TimeBucket,
};
use gourdwatch_core::{MonitoringRecord, RecordFilter, RecordId, RecordStatus, Taxonomy};
use gourdwatch_storage::{Result, Storage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::facade::{self, Summary};

/// Report configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Dimensions used when a query does not name its own
    pub dimensions: Vec<Dimension>,
    /// Time bucket used by snapshots
    pub time_bucket: TimeBucket,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            dimensions: vec![Dimension::Plot, Dimension::GourdType],
            time_bucket: TimeBucket::Week,
        }
    }
}

/// Everything a dashboard shows, computed in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSnapshot {
    /// When snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Reference date for classification
    pub today: NaiveDate,
    /// Headline numbers
    pub summary: Summary,
    /// Records per classified status
    pub status_counts: BTreeMap<RecordStatus, usize>,
    /// Series per configured dimension key
    pub breakdowns: Vec<Breakdown>,
    /// Records with a harvest date today
    pub due_today: Vec<RecordId>,
    /// Documents normalized to defaults
    pub excluded_count: usize,
}

/// Dashboard query service.
#[async_trait]
pub trait ReportService: Send + Sync {
    /// Headline numbers.
    async fn summary(&self, scope: &RecordFilter, today: NaiveDate) -> Result<Summary>;

    /// Series per dimension key.
    async fn breakdown(
        &self,
        scope: &RecordFilter,
        dims: &[Dimension],
        bucket: TimeBucket,
        today: NaiveDate,
    ) -> Result<Vec<Breakdown>>;

    /// Success-rate table.
    async fn success_rates(
        &self,
        scope: &RecordFilter,
        dims: &[Dimension],
        today: NaiveDate,
    ) -> Result<Vec<RateRow>>;

    /// Records with a harvest date today.
    async fn due_today(&self, scope: &RecordFilter, today: NaiveDate) -> Result<Vec<MonitoringRecord>>;

    /// Take a full snapshot.
    async fn snapshot(&self, scope: &RecordFilter, today: NaiveDate) -> Result<ReportSnapshot>;
}

/// Report service over a [`Storage`] backend.
pub struct BasicReportService<S: Storage> {
    storage: Arc<S>,
    config: ReportConfig,
}

impl<S: Storage> BasicReportService<S> {
    /// Create a new report service.
    pub fn new(storage: S) -> Self {
        Self::from_shared(Arc::new(storage))
    }

    /// Create a report service over a shared store.
    pub fn from_shared(storage: Arc<S>) -> Self {
        Self {
            storage,
            config: ReportConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ReportConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Load observations leniently plus the taxonomy index.
    async fn load(&self, scope: &RecordFilter, today: NaiveDate) -> Result<(Vec<Observation>, Taxonomy)> {
        let docs = self.storage.list_documents(scope).await?;
        let observations = observe_documents(&docs, today);
        let taxonomy = self.storage.taxonomy().await?;
        debug!("Loaded {} record documents for reporting", observations.len());
        Ok((observations, taxonomy))
    }

    fn dims_or_default<'a>(&'a self, dims: &'a [Dimension]) -> &'a [Dimension] {
        if dims.is_empty() {
            &self.config.dimensions
        } else {
            dims
        }
    }
}

#[async_trait]
impl<S: Storage + 'static> ReportService for BasicReportService<S> {
    async fn summary(&self, scope: &RecordFilter, today: NaiveDate) -> Result<Summary> {
        let (observations, _) = self.load(scope, today).await?;
        Ok(facade::summarize(&observations))
    }

    async fn breakdown(
        &self,
        scope: &RecordFilter,
        dims: &[Dimension],
        bucket: TimeBucket,
        today: NaiveDate,
    ) -> Result<Vec<Breakdown>> {
        let (observations, taxonomy) = self.load(scope, today).await?;
        Ok(facade::breakdown(&observations, self.dims_or_default(dims), bucket, &taxonomy))
    }

    async fn success_rates(
        &self,
        scope: &RecordFilter,
        dims: &[Dimension],
        today: NaiveDate,
    ) -> Result<Vec<RateRow>> {
        let (observations, taxonomy) = self.load(scope, today).await?;
        Ok(facade::rate_table(&observations, self.dims_or_default(dims), &taxonomy))
    }

    async fn due_today(&self, scope: &RecordFilter, today: NaiveDate) -> Result<Vec<MonitoringRecord>> {
        let records = self.storage.list(scope).await?;
        Ok(facade::due_today(&records, today).into_iter().cloned().collect())
    }

    async fn snapshot(&self, scope: &RecordFilter, today: NaiveDate) -> Result<ReportSnapshot> {
        let (observations, taxonomy) = self.load(scope, today).await?;
        let grouping = gourdwatch_aggregation::group_by(
            &observations,
            &self.config.dimensions,
            self.config.time_bucket,
            &taxonomy,
        );
        let due_today = self.due_today(scope, today).await?.iter().map(|r| r.id).collect();

        let snapshot = ReportSnapshot {
            timestamp: Utc::now(),
            today,
            summary: facade::summarize(&observations),
            status_counts: facade::status_counts(&observations),
            breakdowns: grouping.breakdowns(),
            due_today,
            excluded_count: grouping.excluded_count,
        };
        info!(
            "Snapshot: {} records, {:.2}% success, {} due today",
            snapshot.summary.total,
            snapshot.summary.success_rate,
            snapshot.due_today.len()
        );
        Ok(snapshot)
    }
}
