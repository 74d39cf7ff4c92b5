//! Caller identity passed explicitly into workflow and store calls.

use serde::{Deserialize, Serialize};
use crate::error::{LifecycleError, Result};
use crate::id::OwnerId;
use crate::record::MonitoringRecord;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Owner the caller acts as
    pub owner_id: OwnerId,
}

impl Session {
    /// Create a session for an owner.
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: OwnerId::new(owner_id),
        }
    }

    /// Whether the caller owns `record`.
    pub fn owns(&self, record: &MonitoringRecord) -> bool {
        record.owner_id == self.owner_id
    }

    /// Reject callers that do not own `record`.
    pub fn ensure_owner(&self, record: &MonitoringRecord) -> Result<()> {
        if self.owns(record) {
            Ok(())
        } else {
            Err(LifecycleError::NotOwner {
                record: record.id,
                caller: self.owner_id.clone(),
            })
        }
    }
}
