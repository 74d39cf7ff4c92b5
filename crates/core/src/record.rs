//! Monitoring record model - one pollination event followed through to harvest.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use crate::id::{GourdTypeId, OwnerId, RecordId, VarietyId};
use crate::Time;

/// Number of days in the harvest window.
pub const HARVEST_WINDOW_DAYS: usize = 7;

/// Days between pollination and the first harvest date.
pub const HARVEST_OFFSET_DAYS: i64 = 7;

/// Reference to an uploaded image (URL or storage key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(pub String);

impl ImageRef {
    /// Create a new image reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monitoring status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Harvest window has not opened yet
    Pending,
    /// Inside the harvest window, harvest evidence incomplete
    InProgress,
    /// Every pollinated flower has a harvested fruit photo
    Completed,
    /// Harvest window elapsed without full evidence
    Failed,
}

impl RecordStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [RecordStatus; 4] = [
        RecordStatus::Pending,
        RecordStatus::InProgress,
        RecordStatus::Completed,
        RecordStatus::Failed,
    ];

    /// Completed and Failed are terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Completed | RecordStatus::Failed)
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "Pending",
            RecordStatus::InProgress => "InProgress",
            RecordStatus::Completed => "Completed",
            RecordStatus::Failed => "Failed",
        }
    }

    /// Parse the string representation, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "pending" => Some(RecordStatus::Pending),
            "inprogress" => Some(RecordStatus::InProgress),
            "completed" => Some(RecordStatus::Completed),
            "failed" => Some(RecordStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One day of the harvest window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestDate {
    /// Calendar date
    pub date: NaiveDate,

    /// Whether the owner has been reminded for this date
    #[serde(default)]
    pub notification_sent: bool,
}

/// The seven consecutive harvest dates following a pollination.
///
/// Only constructible from a pollination date, so the window always spans
/// days +7 through +13.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HarvestSchedule([HarvestDate; HARVEST_WINDOW_DAYS]);

impl HarvestSchedule {
    /// Derive the schedule for a pollination date.
    pub fn starting_from(pollination: NaiveDate) -> Self {
        Self(std::array::from_fn(|i| HarvestDate {
            date: pollination + Duration::days(HARVEST_OFFSET_DAYS + i as i64),
            notification_sent: false,
        }))
    }

    /// First harvest date.
    pub fn first(&self) -> NaiveDate {
        self.0[0].date
    }

    /// Last harvest date; the window has elapsed after this day.
    pub fn last(&self) -> NaiveDate {
        self.0[HARVEST_WINDOW_DAYS - 1].date
    }

    /// All entries in date order.
    pub fn entries(&self) -> &[HarvestDate] {
        &self.0
    }

    /// Iterate the dates.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.0.iter().map(|d| d.date)
    }

    /// Whether `date` is one of the harvest dates.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.0.iter().any(|d| d.date == date)
    }

    /// Flag the entry for `date` as notified. Returns false if the date is not scheduled.
    pub(crate) fn mark_sent(&mut self, date: NaiveDate) -> bool {
        match self.0.iter_mut().find(|d| d.date == date) {
            Some(entry) => {
                entry.notification_sent = true;
                true
            }
            None => false,
        }
    }
}

/// A monitoring record tracks one pollination through to harvest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringRecord {
    /// Unique identifier
    pub id: RecordId,

    /// User who created the record
    pub owner_id: OwnerId,

    /// Gourd type
    pub gourd_type: GourdTypeId,

    /// Variety, if recorded
    #[serde(default)]
    pub variety: Option<VarietyId>,

    /// Plot number, if recorded
    #[serde(default)]
    pub plot_no: Option<String>,

    /// Date the flowers were pollinated
    pub date_of_pollination: NaiveDate,

    /// Derived harvest window
    pub harvest_schedule: HarvestSchedule,

    /// Evidence of pollinated flowers
    #[serde(default)]
    pub pollinated_flower_images: Vec<ImageRef>,

    /// Evidence of harvested fruit
    #[serde(default)]
    pub fruit_harvested_images: Vec<ImageRef>,

    /// Persisted status; only terminal values are authoritative
    pub status: RecordStatus,

    /// When the record reached a terminal status
    #[serde(default)]
    pub date_of_finalization: Option<Time>,

    /// Store-managed write counter
    #[serde(default)]
    pub version: u64,

    /// Creation timestamp
    pub created_at: Time,

    /// Last update timestamp
    pub updated_at: Time,
}

impl MonitoringRecord {
    /// Number of pollinated flowers, as evidenced by images.
    pub fn pollinated_count(&self) -> usize {
        self.pollinated_flower_images.len()
    }

    /// Number of harvested fruit, as evidenced by images.
    pub fn harvested_count(&self) -> usize {
        self.fruit_harvested_images.len()
    }

    /// Every pollinated flower has a harvest photo, and there was at least one.
    pub fn harvest_complete(&self) -> bool {
        let pollinated = self.pollinated_count();
        pollinated > 0 && self.harvested_count() == pollinated
    }

    /// Whether `finalize` has already moved the record to a terminal status.
    pub fn is_finalized(&self) -> bool {
        self.date_of_finalization.is_some() || self.status.is_terminal()
    }
}

/// Input for creating a record.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// Gourd type
    pub gourd_type: GourdTypeId,

    /// Variety
    pub variety: Option<VarietyId>,

    /// Plot number
    pub plot_no: Option<String>,

    /// Pollination date
    pub date_of_pollination: NaiveDate,

    /// Initial pollinated-flower evidence
    pub pollinated_flower_images: Vec<ImageRef>,
}

/// Update to a record's descriptive fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPatch {
    /// New gourd type
    pub gourd_type: Option<GourdTypeId>,

    /// New variety; `Some(None)` clears it
    pub variety: Option<Option<VarietyId>>,

    /// New plot number; `Some(None)` clears it
    pub plot_no: Option<Option<String>>,

    /// New pollination date; the schedule is recomputed
    pub date_of_pollination: Option<NaiveDate>,
}

impl RecordPatch {
    /// True if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.gourd_type.is_none()
            && self.variety.is_none()
            && self.plot_no.is_none()
            && self.date_of_pollination.is_none()
    }
}

/// Filter for listing records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Only records created by this owner
    pub owner: Option<OwnerId>,

    /// Only records on this plot
    pub plot_no: Option<String>,

    /// Only records of this gourd type
    pub gourd_type: Option<GourdTypeId>,
}

impl RecordFilter {
    /// Filter for one owner's records.
    pub fn owned_by(owner: OwnerId) -> Self {
        Self {
            owner: Some(owner),
            ..Default::default()
        }
    }

    /// Whether a record passes the filter.
    pub fn matches(&self, record: &MonitoringRecord) -> bool {
        if let Some(owner) = &self.owner {
            if &record.owner_id != owner {
                return false;
            }
        }
        if let Some(plot) = &self.plot_no {
            if record.plot_no.as_deref() != Some(plot.as_str()) {
                return false;
            }
        }
        if let Some(gourd_type) = &self.gourd_type {
            if &record.gourd_type != gourd_type {
                return false;
            }
        }
        true
    }
}

/// Trim a plot number; blank becomes absent.
pub fn normalize_plot(plot_no: Option<String>) -> Option<String> {
    plot_no
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_schedule_spans_days_seven_to_thirteen() {
        let schedule = HarvestSchedule::starting_from(date(2024, 1, 1));
        assert_eq!(schedule.entries().len(), HARVEST_WINDOW_DAYS);
        assert_eq!(schedule.first(), date(2024, 1, 8));
        assert_eq!(schedule.last(), date(2024, 1, 14));
        assert!(schedule.entries().iter().all(|d| !d.notification_sent));
    }

    #[test]
    fn test_schedule_crosses_month_end() {
        let schedule = HarvestSchedule::starting_from(date(2024, 2, 25));
        let dates: Vec<_> = schedule.dates().collect();
        assert_eq!(dates[0], date(2024, 3, 3));
        assert_eq!(dates[6], date(2024, 3, 9));
    }

    #[test]
    fn test_mark_sent_only_for_scheduled_dates() {
        let mut schedule = HarvestSchedule::starting_from(date(2024, 1, 1));
        assert!(schedule.mark_sent(date(2024, 1, 10)));
        assert!(!schedule.mark_sent(date(2024, 1, 1)));
        let sent: Vec<_> = schedule
            .entries()
            .iter()
            .filter(|d| d.notification_sent)
            .map(|d| d.date)
            .collect();
        assert_eq!(sent, vec![date(2024, 1, 10)]);
    }

    #[test]
    fn test_status_parse_and_terminal() {
        assert_eq!(RecordStatus::parse("in-progress"), Some(RecordStatus::InProgress));
        assert_eq!(RecordStatus::parse("COMPLETED"), Some(RecordStatus::Completed));
        assert_eq!(RecordStatus::parse("done"), None);
        assert!(RecordStatus::Failed.is_terminal());
        assert!(!RecordStatus::Pending.is_terminal());
    }

    #[test]
    fn test_status_serializes_pascal_case() {
        let json = serde_json::to_string(&RecordStatus::InProgress).unwrap();
        assert_eq!(json, "\"InProgress\"");
    }

    #[test]
    fn test_normalize_plot() {
        assert_eq!(normalize_plot(Some("  P-3 ".into())), Some("P-3".to_string()));
        assert_eq!(normalize_plot(Some("   ".into())), None);
        assert_eq!(normalize_plot(None), None);
    }
}
