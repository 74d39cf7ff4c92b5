//! GourdWatch core data models and lifecycle engine.
//!
//! This crate defines the monitoring record, taxonomy reference data and
//! the pure lifecycle operations that move a record from pollination to a
//! finalized harvest outcome.

#![warn(missing_docs)]

// Core identities
mod id;
mod session;

// Reference data
mod taxonomy;

// Monitoring
mod record;
mod error;
pub mod lifecycle;

// Re-exports
pub use id::*;
pub use session::Session;

pub use taxonomy::{GourdType, GourdVariety, Taxonomy, TaxonomyLookup};

pub use record::{
    normalize_plot, HarvestDate, HarvestSchedule, ImageRef, MonitoringRecord, NewRecord,
    RecordFilter, RecordPatch, RecordStatus, HARVEST_OFFSET_DAYS, HARVEST_WINDOW_DAYS,
};
pub use error::{LifecycleError, Result};

pub use lifecycle::{
    add_harvested_image, add_pollinated_image, classify_counts, classify_status,
    compute_harvest_schedule, finalize, is_due_today, parse_date, validate_creation,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
