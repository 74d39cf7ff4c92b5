//! JSON file storage implementation.
//!
//! Stores each record and each taxonomy entry as its own JSON file under a
//! root directory (`records/`, `gourd_types/`, `varieties/`). The record's
//! `version` field is the only concurrency marker.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use gourdwatch_core::{GourdType, GourdTypeId, GourdVariety, MonitoringRecord, RecordFilter, RecordId, VarietyId};
use super::trait_::{document_matches, ConcurrencyMode, RecordStore, Result, StorageError, TaxonomyStore};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File-based JSON storage backend.
#[derive(Clone)]
pub struct JsonStorage {
    root: PathBuf,
    concurrency: ConcurrencyMode,
    // Serializes read-modify-write of a single record file.
    write_lock: Arc<Mutex<()>>,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the subdirectories it needs.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("records")).await?;
        fs::create_dir_all(root.join("gourd_types")).await?;
        fs::create_dir_all(root.join("varieties")).await?;

        Ok(Self {
            root,
            concurrency: ConcurrencyMode::default(),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Set the concurrency mode used by `update`.
    pub fn with_concurrency(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency = mode;
        self
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: RecordId) -> PathBuf {
        self.root.join("records").join(format!("{}.json", id))
    }
    fn gourd_type_path(&self, id: GourdTypeId) -> PathBuf {
        self.root.join("gourd_types").join(format!("{}.json", id))
    }
    fn variety_path(&self, id: VarietyId) -> PathBuf {
        self.root.join("varieties").join(format!("{}.json", id))
    }

    async fn write_record(&self, record: &MonitoringRecord) -> Result<()> {
        let json = serde_json::to_string_pretty(record)?;
        fs::write(self.record_path(record.id), json.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for JsonStorage {
    async fn list(&self, filter: &RecordFilter) -> Result<Vec<MonitoringRecord>> {
        let mut records: Vec<MonitoringRecord> = list_dir(&self.root.join("records")).await?;
        records.retain(|r| filter.matches(r));
        records.sort_by(|a, b| {
            a.date_of_pollination
                .cmp(&b.date_of_pollination)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(records)
    }

    async fn list_documents(&self, filter: &RecordFilter) -> Result<Vec<serde_json::Value>> {
        let docs: Vec<serde_json::Value> = list_dir(&self.root.join("records")).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| document_matches(filter, doc))
            .collect())
    }

    async fn get(&self, id: RecordId) -> Result<Option<MonitoringRecord>> {
        read_json(&self.record_path(id)).await
    }

    async fn create(&mut self, record: &MonitoringRecord) -> Result<MonitoringRecord> {
        let _guard = self.write_lock.lock().await;
        if fs::try_exists(self.record_path(record.id)).await? {
            return Err(StorageError::Other(format!("Record already exists: {}", record.id)));
        }

        let mut stored = record.clone();
        stored.version = 1;
        self.write_record(&stored).await?;
        debug!("Created record {} for {}", stored.id, stored.owner_id);
        Ok(stored)
    }

    async fn update(&mut self, record: &MonitoringRecord) -> Result<MonitoringRecord> {
        let _guard = self.write_lock.lock().await;
        let current: MonitoringRecord = read_json(&self.record_path(record.id))
            .await?
            .ok_or(StorageError::RecordNotFound(record.id))?;
        self.concurrency.check(record.id, record.version, current.version)?;

        let mut stored = record.clone();
        stored.version = current.version + 1;
        self.write_record(&stored).await?;
        debug!("Updated record {} to v{}", stored.id, stored.version);
        Ok(stored)
    }

    async fn delete(&mut self, id: RecordId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        fs::remove_file(self.record_path(id)).await.or_else(|e| {
            if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
        })?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TaxonomyStore for JsonStorage {
    async fn save_gourd_type(&mut self, gourd_type: &GourdType) -> Result<()> {
        let json = serde_json::to_string_pretty(gourd_type)?;
        fs::write(self.gourd_type_path(gourd_type.id), json.as_bytes()).await?;
        Ok(())
    }

    async fn list_gourd_types(&self) -> Result<Vec<GourdType>> {
        let mut types: Vec<GourdType> = list_dir(&self.root.join("gourd_types")).await?;
        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(types)
    }

    async fn save_variety(&mut self, variety: &GourdVariety) -> Result<()> {
        let json = serde_json::to_string_pretty(variety)?;
        fs::write(self.variety_path(variety.id), json.as_bytes()).await?;
        Ok(())
    }

    async fn list_varieties(&self) -> Result<Vec<GourdVariety>> {
        let mut varieties: Vec<GourdVariety> = list_dir(&self.root.join("varieties")).await?;
        varieties.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(varieties)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        match read_json(&path).await {
            Ok(Some(item)) => items.push(item),
            Ok(None) => {}
            Err(e) => warn!("Skipping unreadable {}: {}", path.display(), e),
        }
    }
    Ok(items)
}
