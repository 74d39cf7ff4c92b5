//! Application configuration read from `<storage>/config.json`.

use std::path::Path;

use anyhow::{Context, Result};
use gourdwatch_aggregation::{Dimension, TimeBucket};
use gourdwatch_report::ReportConfig;
use gourdwatch_storage::ConcurrencyMode;
use serde::{Deserialize, Serialize};

/// Name of the config file inside the storage directory.
pub const CONFIG_FILE: &str = "config.json";

/// Settings read from the storage directory; CLI flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Owner used when `--owner` is not given
    pub owner: Option<String>,
    /// How the store resolves concurrent updates
    pub concurrency: ConcurrencyMode,
    /// Dimensions used when a report names none
    pub default_dimensions: Vec<Dimension>,
    /// Time bucket used by snapshots
    pub time_bucket: TimeBucket,
}

impl Default for AppConfig {
    fn default() -> Self {
        let report = ReportConfig::default();
        Self {
            owner: None,
            concurrency: ConcurrencyMode::default(),
            default_dimensions: report.dimensions,
            time_bucket: report.time_bucket,
        }
    }
}

impl AppConfig {
    /// Load config from `dir`, falling back to defaults when the file is absent.
    pub async fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILE);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Report settings carried by this config.
    pub fn report_config(&self) -> ReportConfig {
        ReportConfig {
            dimensions: self.default_dimensions.clone(),
            time_bucket: self.time_bucket,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig::load(dir.path()).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.default_dimensions, vec![Dimension::Plot, Dimension::GourdType]);
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"owner": "alice", "concurrency": "Optimistic"}"#,
        )
        .await
        .unwrap();

        let config = AppConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.owner.as_deref(), Some("alice"));
        assert_eq!(config.concurrency, ConcurrencyMode::Optimistic);
        assert_eq!(config.time_bucket, TimeBucket::Week);
    }

    #[tokio::test]
    async fn test_bad_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join(CONFIG_FILE), "{ nope").await.unwrap();
        assert!(AppConfig::load(dir.path()).await.is_err());
    }
}
