//! Storage trait abstraction.

use async_trait::async_trait;
use gourdwatch_core::{
    GourdType, GourdVariety, MonitoringRecord, RecordFilter, RecordId, Taxonomy,
};
use serde::{Deserialize, Serialize};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    /// Other item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency check failed
    #[error("Version conflict on {id}: caller has v{expected}, store has v{found}")]
    VersionConflict {
        /// Record id
        id: RecordId,
        /// Version the caller loaded
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// How concurrent updates to the same record are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyMode {
    /// The latest write replaces whatever is stored
    #[default]
    LastWriteWins,

    /// A write must carry the version currently stored
    Optimistic,
}

impl ConcurrencyMode {
    /// Validate a write of `incoming` against the `stored` version.
    pub fn check(&self, id: RecordId, incoming: u64, stored: u64) -> Result<()> {
        match self {
            ConcurrencyMode::LastWriteWins => Ok(()),
            ConcurrencyMode::Optimistic if incoming == stored => Ok(()),
            ConcurrencyMode::Optimistic => Err(StorageError::VersionConflict {
                id,
                expected: incoming,
                found: stored,
            }),
        }
    }
}

/// Persistence for monitoring records.
///
/// Records are written whole: callers apply lifecycle operations to a loaded
/// value and hand the result back through [`RecordStore::update`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// List records matching the filter.
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<MonitoringRecord>>;

    /// List raw stored documents matching the filter.
    ///
    /// Reporting reads through this so one malformed document cannot hide
    /// the rest. The default serializes the typed listing.
    async fn list_documents(&self, filter: &RecordFilter) -> Result<Vec<serde_json::Value>> {
        self.list(filter)
            .await?
            .iter()
            .map(|r| serde_json::to_value(r).map_err(StorageError::from))
            .collect()
    }

    /// Load a record by ID.
    async fn get(&self, id: RecordId) -> Result<Option<MonitoringRecord>>;

    /// Persist a new record. Returns the stored value (version 1).
    async fn create(&mut self, record: &MonitoringRecord) -> Result<MonitoringRecord>;

    /// Replace an existing record. Returns the stored value with its bumped version.
    async fn update(&mut self, record: &MonitoringRecord) -> Result<MonitoringRecord>;

    /// Delete a record. Deleting a missing record is not an error.
    async fn delete(&mut self, id: RecordId) -> Result<()>;
}

/// Persistence for taxonomy reference data.
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    /// Save a gourd type (create or update).
    async fn save_gourd_type(&mut self, gourd_type: &GourdType) -> Result<()>;

    /// List all gourd types.
    async fn list_gourd_types(&self) -> Result<Vec<GourdType>>;

    /// Save a variety (create or update).
    async fn save_variety(&mut self, variety: &GourdVariety) -> Result<()>;

    /// List all varieties.
    async fn list_varieties(&self) -> Result<Vec<GourdVariety>>;

    /// Load a lookup index over all reference data.
    async fn taxonomy(&self) -> Result<Taxonomy> {
        Ok(Taxonomy::from_parts(
            self.list_gourd_types().await?,
            self.list_varieties().await?,
        ))
    }
}

/// A backend providing both record and taxonomy persistence.
pub trait Storage: RecordStore + TaxonomyStore {}

impl<T: RecordStore + TaxonomyStore> Storage for T {}

/// Whether a raw document passes the filter's owner constraint.
///
/// Only the owner is checked on raw documents; the other fields may be
/// the malformed part.
pub(crate) fn document_matches(filter: &RecordFilter, doc: &serde_json::Value) -> bool {
    match &filter.owner {
        Some(owner) => doc.get("owner_id").and_then(|v| v.as_str()) == Some(owner.as_str()),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins_ignores_versions() {
        let id = RecordId::new();
        assert!(ConcurrencyMode::LastWriteWins.check(id, 1, 7).is_ok());
    }

    #[test]
    fn test_optimistic_rejects_stale_version() {
        let id = RecordId::new();
        assert!(ConcurrencyMode::Optimistic.check(id, 3, 3).is_ok());
        match ConcurrencyMode::Optimistic.check(id, 2, 3) {
            Err(StorageError::VersionConflict { expected, found, .. }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 3);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_document_matches_owner() {
        let filter = RecordFilter::owned_by(gourdwatch_core::OwnerId::new("alice"));
        assert!(document_matches(&filter, &serde_json::json!({"owner_id": "alice"})));
        assert!(!document_matches(&filter, &serde_json::json!({"owner_id": "bob"})));
        assert!(!document_matches(&filter, &serde_json::json!({})));
        assert!(document_matches(&RecordFilter::default(), &serde_json::json!({})));
    }
}
