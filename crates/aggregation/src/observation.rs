//! Observations - the normalized per-record view the aggregation works on.
//!
//! Typed records convert losslessly. Raw documents from a store are read
//! leniently: anything missing or mistyped is replaced with a safe default
//! and the observation is flagged as normalized.

use chrono::{DateTime, NaiveDate};
use gourdwatch_core::{
    classify_counts, compute_harvest_schedule, normalize_plot, GourdTypeId, MonitoringRecord,
    RecordStatus, VarietyId,
};
use serde_json::Value;
use tracing::warn;

/// One record as seen by the aggregation engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Plot number, if usable
    pub plot_no: Option<String>,

    /// Gourd type, if usable
    pub gourd_type: Option<GourdTypeId>,

    /// Variety, if usable
    pub variety: Option<VarietyId>,

    /// Pollination date, if usable
    pub date_of_pollination: Option<NaiveDate>,

    /// Pollinated-flower count
    pub pollinated: usize,

    /// Harvested-fruit count, clamped to `pollinated`
    pub harvested: usize,

    /// Status classified as of the report date
    pub status: RecordStatus,

    /// Whether defaults were substituted for malformed fields
    pub normalized: bool,
}

impl Observation {
    /// Observe a typed record as of `today`.
    pub fn from_record(record: &MonitoringRecord, today: NaiveDate) -> Self {
        Self {
            plot_no: record.plot_no.clone(),
            gourd_type: Some(record.gourd_type),
            variety: record.variety,
            date_of_pollination: Some(record.date_of_pollination),
            pollinated: record.pollinated_count(),
            harvested: record.harvested_count(),
            status: gourdwatch_core::classify_status(record, today),
            normalized: false,
        }
    }

    /// Observe a raw stored document as of `today`. Never fails.
    pub fn from_document(doc: &Value, today: NaiveDate) -> Self {
        let mut normalized = false;

        let plot_no = match doc.get("plot_no") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => normalize_plot(Some(s.clone())),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(_) => {
                normalized = true;
                None
            }
        };

        let gourd_type = match doc.get("gourd_type").and_then(Value::as_str) {
            Some(s) => s.parse().ok(),
            None => None,
        };
        if gourd_type.is_none() {
            normalized = true;
        }

        let variety = match doc.get("variety") {
            None | Some(Value::Null) => None,
            Some(v) => {
                let parsed = v.as_str().and_then(|s| s.parse().ok());
                if parsed.is_none() {
                    normalized = true;
                }
                parsed
            }
        };

        let date_of_pollination = doc.get("date_of_pollination").and_then(parse_loose_date);
        if date_of_pollination.is_none() {
            normalized = true;
        }

        let pollinated = image_count(doc.get("pollinated_flower_images"), &mut normalized);
        let mut harvested = image_count(doc.get("fruit_harvested_images"), &mut normalized);
        if harvested > pollinated {
            harvested = pollinated;
            normalized = true;
        }

        let status = match date_of_pollination {
            Some(date) => classify_counts(&compute_harvest_schedule(date), pollinated, harvested, today),
            None if pollinated > 0 && harvested == pollinated => RecordStatus::Completed,
            None => doc
                .get("status")
                .and_then(Value::as_str)
                .and_then(RecordStatus::parse)
                .filter(RecordStatus::is_terminal)
                .unwrap_or(RecordStatus::Pending),
        };

        if normalized {
            let id = doc.get("id").and_then(Value::as_str).unwrap_or("<no id>");
            warn!("Normalized malformed record document {}", id);
        }

        Self {
            plot_no,
            gourd_type,
            variety,
            date_of_pollination,
            pollinated,
            harvested,
            status,
            normalized,
        }
    }

    /// Whether the record has reached a terminal status.
    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    /// Harvested count that reports may use: zero until finalized.
    pub fn counted_harvest(&self) -> usize {
        if self.is_finalized() {
            self.harvested
        } else {
            0
        }
    }
}

/// Observe a slice of typed records.
pub fn observe(records: &[MonitoringRecord], today: NaiveDate) -> Vec<Observation> {
    records.iter().map(|r| Observation::from_record(r, today)).collect()
}

/// Observe a slice of raw documents.
pub fn observe_documents(docs: &[Value], today: NaiveDate) -> Vec<Observation> {
    docs.iter().map(|d| Observation::from_document(d, today)).collect()
}

fn image_count(field: Option<&Value>, normalized: &mut bool) -> usize {
    match field {
        None | Some(Value::Null) => 0,
        Some(Value::Array(items)) => items.len(),
        Some(_) => {
            *normalized = true;
            0
        }
    }
}

/// Accept `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_loose_date(value: &Value) -> Option<NaiveDate> {
    let text = value.as_str()?.trim();
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}
