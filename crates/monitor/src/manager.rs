//! Monitoring workflow service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use gourdwatch_core::{
    lifecycle, ImageRef, LifecycleError, MonitoringRecord, NewRecord, RecordFilter, RecordId,
    RecordPatch, RecordStatus, Session, Time,
};
use gourdwatch_storage::{RecordStore, Storage, StorageError};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Workflow errors.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// A lifecycle rule rejected the operation
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The store failed or the record is missing
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// A status change made by [`MonitorManager::refresh`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// Record that changed
    pub record: RecordId,
    /// Persisted status before
    pub from: RecordStatus,
    /// Persisted status after
    pub to: RecordStatus,
}

/// Monitoring workflow service.
#[async_trait]
pub trait MonitorManager: Send + Sync {
    /// Validate and persist a new record for the caller.
    async fn create_record(
        &self,
        session: &Session,
        new: NewRecord,
        today: NaiveDate,
        now: Time,
    ) -> Result<MonitoringRecord>;

    /// Append a pollinated-flower image.
    async fn add_pollinated_image(
        &self,
        session: &Session,
        id: RecordId,
        image: ImageRef,
        now: Time,
    ) -> Result<MonitoringRecord>;

    /// Append a harvested-fruit image. Rejected once the window has closed on `now`'s date.
    async fn add_harvested_image(
        &self,
        session: &Session,
        id: RecordId,
        image: ImageRef,
        now: Time,
    ) -> Result<MonitoringRecord>;

    /// Finalize a record if it has earned a terminal status.
    async fn finalize(&self, session: &Session, id: RecordId, now: Time) -> Result<MonitoringRecord>;

    /// Move the pollination date and rebuild the schedule.
    ///
    /// The new date passes the creation guard on `now`'s date.
    async fn reschedule(
        &self,
        session: &Session,
        id: RecordId,
        pollination: NaiveDate,
        now: Time,
    ) -> Result<MonitoringRecord>;

    /// Change descriptive fields.
    async fn update_details(
        &self,
        session: &Session,
        id: RecordId,
        patch: RecordPatch,
        now: Time,
    ) -> Result<MonitoringRecord>;

    /// Load one of the caller's records.
    async fn get_record(&self, session: &Session, id: RecordId) -> Result<MonitoringRecord>;

    /// List the caller's records. The filter's owner is replaced by the caller.
    async fn list_records(
        &self,
        session: &Session,
        filter: RecordFilter,
    ) -> Result<Vec<MonitoringRecord>>;

    /// Delete one of the caller's records.
    async fn delete_record(&self, session: &Session, id: RecordId) -> Result<()>;

    /// Finalize every owned record that is ready.
    async fn refresh(&self, session: &Session, now: Time) -> Result<Vec<Transition>>;

    /// Owned records with an unsent reminder for `today`.
    async fn notifications_due(
        &self,
        session: &Session,
        today: NaiveDate,
    ) -> Result<Vec<(MonitoringRecord, NaiveDate)>>;

    /// Record that the reminder for `date` went out.
    async fn acknowledge_notification(
        &self,
        session: &Session,
        id: RecordId,
        date: NaiveDate,
        now: Time,
    ) -> Result<MonitoringRecord>;
}

/// Monitor manager over a shared store.
pub struct BasicMonitorManager<S: Storage> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> BasicMonitorManager<S> {
    /// Create a new monitor manager.
    pub fn new(storage: S) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
        }
    }

    /// Create a monitor manager over an already shared store.
    pub fn from_shared(storage: Arc<Mutex<S>>) -> Self {
        Self { storage }
    }

    /// The shared store.
    pub fn storage(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.storage)
    }

    async fn load_owned(&self, session: &Session, id: RecordId) -> Result<MonitoringRecord> {
        let record = self
            .storage
            .lock()
            .await
            .get(id)
            .await?
            .ok_or(StorageError::RecordNotFound(id))?;
        session.ensure_owner(&record)?;
        Ok(record)
    }

    async fn persist(&self, record: &MonitoringRecord) -> Result<MonitoringRecord> {
        Ok(self.storage.lock().await.update(record).await?)
    }

    /// Load, transform and persist in one step.
    async fn modify<F>(&self, session: &Session, id: RecordId, op: F) -> Result<MonitoringRecord>
    where
        F: FnOnce(&MonitoringRecord) -> std::result::Result<MonitoringRecord, LifecycleError>
            + Send,
    {
        let record = self.load_owned(session, id).await?;
        let next = op(&record)?;
        if next == record {
            return Ok(record);
        }
        self.persist(&next).await
    }
}

#[async_trait]
impl<S: Storage + 'static> MonitorManager for BasicMonitorManager<S> {
    async fn create_record(
        &self,
        session: &Session,
        new: NewRecord,
        today: NaiveDate,
        now: Time,
    ) -> Result<MonitoringRecord> {
        let record = lifecycle::create_record(session.owner_id.clone(), new, today, now)?;
        let stored = self.storage.lock().await.create(&record).await?;
        info!(
            "Created record {} pollinated {} ({} flowers)",
            stored.id,
            stored.date_of_pollination,
            stored.pollinated_count()
        );
        Ok(stored)
    }

    async fn add_pollinated_image(
        &self,
        session: &Session,
        id: RecordId,
        image: ImageRef,
        now: Time,
    ) -> Result<MonitoringRecord> {
        let record = self
            .modify(session, id, |r| lifecycle::add_pollinated_image(r, image, now))
            .await?;
        debug!("Record {} now has {} pollinated", id, record.pollinated_count());
        Ok(record)
    }

    async fn add_harvested_image(
        &self,
        session: &Session,
        id: RecordId,
        image: ImageRef,
        now: Time,
    ) -> Result<MonitoringRecord> {
        let record = self
            .modify(session, id, |r| lifecycle::add_harvested_image(r, image, now.date_naive(), now))
            .await?;
        debug!(
            "Record {} harvested {}/{}",
            id,
            record.harvested_count(),
            record.pollinated_count()
        );
        Ok(record)
    }

    async fn finalize(&self, session: &Session, id: RecordId, now: Time) -> Result<MonitoringRecord> {
        let record = self
            .modify(session, id, |r| Ok(lifecycle::finalize(r, now)))
            .await?;
        if record.is_finalized() {
            info!("Record {} finalized as {}", id, record.status);
        }
        Ok(record)
    }

    async fn reschedule(
        &self,
        session: &Session,
        id: RecordId,
        pollination: NaiveDate,
        now: Time,
    ) -> Result<MonitoringRecord> {
        let record = self
            .modify(session, id, |r| lifecycle::reschedule(r, pollination, now.date_naive(), now))
            .await?;
        info!("Record {} rescheduled to {}", id, pollination);
        Ok(record)
    }

    async fn update_details(
        &self,
        session: &Session,
        id: RecordId,
        patch: RecordPatch,
        now: Time,
    ) -> Result<MonitoringRecord> {
        self.modify(session, id, |r| lifecycle::apply_patch(r, &patch, now.date_naive(), now))
            .await
    }

    async fn get_record(&self, session: &Session, id: RecordId) -> Result<MonitoringRecord> {
        self.load_owned(session, id).await
    }

    async fn list_records(
        &self,
        session: &Session,
        filter: RecordFilter,
    ) -> Result<Vec<MonitoringRecord>> {
        let filter = RecordFilter {
            owner: Some(session.owner_id.clone()),
            ..filter
        };
        Ok(self.storage.lock().await.list(&filter).await?)
    }

    async fn delete_record(&self, session: &Session, id: RecordId) -> Result<()> {
        self.load_owned(session, id).await?;
        self.storage.lock().await.delete(id).await?;
        info!("Deleted record {}", id);
        Ok(())
    }

    async fn refresh(&self, session: &Session, now: Time) -> Result<Vec<Transition>> {
        let records = self
            .list_records(session, RecordFilter::default())
            .await?;

        let mut transitions = Vec::new();
        for record in records.iter().filter(|r| !r.is_finalized()) {
            let next = lifecycle::finalize(record, now);
            if next.status == record.status {
                continue;
            }
            self.persist(&next).await?;
            transitions.push(Transition {
                record: record.id,
                from: record.status,
                to: next.status,
            });
        }

        info!(
            "Refreshed {} records for {}, {} finalized",
            records.len(),
            session.owner_id,
            transitions.len()
        );
        Ok(transitions)
    }

    async fn notifications_due(
        &self,
        session: &Session,
        today: NaiveDate,
    ) -> Result<Vec<(MonitoringRecord, NaiveDate)>> {
        let records = self
            .list_records(session, RecordFilter::default())
            .await?;
        Ok(records
            .into_iter()
            .flat_map(|r| {
                lifecycle::pending_notifications(&r, today)
                    .into_iter()
                    .map(move |date| (r.clone(), date))
                    .collect::<Vec<_>>()
            })
            .collect())
    }

    async fn acknowledge_notification(
        &self,
        session: &Session,
        id: RecordId,
        date: NaiveDate,
        now: Time,
    ) -> Result<MonitoringRecord> {
        self.modify(session, id, |r| {
            Ok(lifecycle::mark_notification_sent(r, date, now))
        })
        .await
    }
}
