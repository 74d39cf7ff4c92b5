//! Lifecycle errors.

use chrono::NaiveDate;
use crate::id::{OwnerId, RecordId};

/// Errors returned by lifecycle operations.
///
/// All of these are recoverable: the caller may retry with corrected input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    /// The creation guard date is already behind us
    #[error("harvest window passed: pollination on {pollination} closed on {terminal}, today is {today}")]
    HarvestWindowPassed {
        /// Pollination date supplied
        pollination: NaiveDate,
        /// Pollination date + 14 days
        terminal: NaiveDate,
        /// Reference date
        today: NaiveDate,
    },

    /// Adding the image would exceed the pollinated count
    #[error("harvested images ({harvested}) cannot exceed pollinated images ({pollinated})")]
    ExceedsPollinatedCount {
        /// Pollinated count
        pollinated: usize,
        /// Harvested count after the rejected addition
        harvested: usize,
    },

    /// The harvest window closed before the evidence arrived
    #[error("record {record}: harvest window closed on {closed_on}, today is {today}")]
    HarvestWindowClosed {
        /// Record id
        record: RecordId,
        /// Last harvest date
        closed_on: NaiveDate,
        /// Reference date
        today: NaiveDate,
    },

    /// The record has reached a terminal status
    #[error("record {0} is already finalized")]
    AlreadyFinalized(RecordId),

    /// A record needs at least one pollinated-flower image
    #[error("at least one pollinated flower image is required")]
    MissingPollinatedImages,

    /// The session owner does not own the record
    #[error("record {record} belongs to another owner (caller: {caller})")]
    NotOwner {
        /// Record id
        record: RecordId,
        /// Session owner
        caller: OwnerId,
    },

    /// Unparseable or out-of-range date
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// Result alias for lifecycle operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;
