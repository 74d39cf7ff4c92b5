//! In-memory storage backend, used by tests and embedders that fetch records elsewhere.

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use gourdwatch_core::{GourdType, GourdTypeId, GourdVariety, MonitoringRecord, RecordFilter, RecordId, VarietyId};
use tokio::sync::Mutex;
use super::trait_::{ConcurrencyMode, RecordStore, Result, StorageError, TaxonomyStore};

/// In-memory storage implementation.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    records: Arc<Mutex<HashMap<RecordId, MonitoringRecord>>>,
    gourd_types: Arc<Mutex<HashMap<GourdTypeId, GourdType>>>,
    varieties: Arc<Mutex<HashMap<VarietyId, GourdVariety>>>,
    concurrency: ConcurrencyMode,
}

impl InMemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency mode used by `update`.
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }
}

#[async_trait]
impl RecordStore for InMemoryStorage {
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<MonitoringRecord>> {
        let records = self.records.lock().await;
        let mut out: Vec<_> = records.values().filter(|r| filter.matches(r)).cloned().collect();
        out.sort_by(|a, b| {
            a.date_of_pollination
                .cmp(&b.date_of_pollination)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(out)
    }

    async fn get(&self, id: RecordId) -> Result<Option<MonitoringRecord>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn create(&mut self, record: &MonitoringRecord) -> Result<MonitoringRecord> {
        let mut records = self.records.lock().await;
        if records.contains_key(&record.id) {
            return Err(StorageError::Other(format!("Record already exists: {}", record.id)));
        }
        let mut stored = record.clone();
        stored.version = 1;
        records.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&mut self, record: &MonitoringRecord) -> Result<MonitoringRecord> {
        let mut records = self.records.lock().await;
        let current = records
            .get(&record.id)
            .ok_or(StorageError::RecordNotFound(record.id))?;
        self.concurrency.check(record.id, record.version, current.version)?;

        let mut stored = record.clone();
        stored.version = current.version + 1;
        records.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn delete(&mut self, id: RecordId) -> Result<()> {
        self.records.lock().await.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl TaxonomyStore for InMemoryStorage {
    async fn save_gourd_type(&mut self, gourd_type: &GourdType) -> Result<()> {
        self.gourd_types.lock().await.insert(gourd_type.id, gourd_type.clone());
        Ok(())
    }

    async fn list_gourd_types(&self) -> Result<Vec<GourdType>> {
        let mut out: Vec<_> = self.gourd_types.lock().await.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn save_variety(&mut self, variety: &GourdVariety) -> Result<()> {
        self.varieties.lock().await.insert(variety.id, variety.clone());
        Ok(())
    }

    async fn list_varieties(&self) -> Result<Vec<GourdVariety>> {
        let mut out: Vec<_> = self.varieties.lock().await.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use gourdwatch_core::{lifecycle, ImageRef, NewRecord, OwnerId};

    fn sample() -> MonitoringRecord {
        let pollination = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        lifecycle::create_record(
            OwnerId::new("alice"),
            NewRecord {
                gourd_type: GourdTypeId::new(),
                variety: None,
                plot_no: None,
                date_of_pollination: pollination,
                pollinated_flower_images: vec![ImageRef::new("f.jpg")],
            },
            pollination,
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_in_memory_versions_and_documents() {
        let mut storage = InMemoryStorage::new().with_concurrency(ConcurrencyMode::Optimistic);
        let stored = storage.create(&sample()).await.unwrap();
        let updated = storage.update(&stored).await.unwrap();
        assert_eq!(updated.version, 2);
        assert!(storage.update(&stored).await.is_err());

        let docs = storage.list_documents(&RecordFilter::default()).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["version"], 2);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let mut storage = InMemoryStorage::new();
        let view = storage.clone();
        let stored = storage.create(&sample()).await.unwrap();
        assert!(view.get(stored.id).await.unwrap().is_some());
    }
}
