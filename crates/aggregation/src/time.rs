//! Time buckets for reports.
//!
//! Week numbers follow the dashboards' historical formula, not ISO-8601:
//! weeks start on Sunday and week 1 is the (possibly partial) week that
//! contains January 1st.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Week number and year of a date.
///
/// `week = ceil((days since Jan 1 + weekday of Jan 1 + 1) / 7)`, with
/// Sunday = 0.
pub fn week_key(date: NaiveDate) -> (u32, i32) {
    let past_days = date.ordinal0();
    let jan1_weekday = (date.weekday().num_days_from_sunday() + 7 - past_days % 7) % 7;
    let week = (past_days + jan1_weekday + 1 + 6) / 7;
    (week, date.year())
}

/// Zero-based month index and year of a date.
pub fn month_key(date: NaiveDate) -> (u32, i32) {
    (date.month0(), date.year())
}

/// Granularity of the time axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeBucket {
    /// Sunday-start weeks
    #[default]
    Week,
    /// Calendar months
    Month,
}

impl TimeBucket {
    /// Bucket a date; records without one land in [`TimeKey::Undated`].
    pub fn key(&self, date: Option<NaiveDate>) -> TimeKey {
        match (self, date) {
            (_, None) => TimeKey::Undated,
            (TimeBucket::Week, Some(d)) => {
                let (week, year) = week_key(d);
                TimeKey::Week { year, week }
            }
            (TimeBucket::Month, Some(d)) => {
                let (month, year) = month_key(d);
                TimeKey::Month { year, month }
            }
        }
    }

    /// Parse "week"/"month".
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "week" | "weekly" => Some(TimeBucket::Week),
            "month" | "monthly" => Some(TimeBucket::Month),
            _ => None,
        }
    }
}

/// A point on the time axis.
///
/// Field order makes the derived ordering numeric: year first, then week or
/// month. Undated sorts after every dated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeKey {
    /// A week of a year
    Week {
        /// Calendar year
        year: i32,
        /// Week number, 1-based
        week: u32,
    },
    /// A month of a year
    Month {
        /// Calendar year
        year: i32,
        /// Month index, 0-based
        month: u32,
    },
    /// No usable pollination date
    Undated,
}

impl TimeKey {
    /// Display label, e.g. "Week 2, 2024" or "Jan 2024".
    pub fn label(&self) -> String {
        match self {
            TimeKey::Week { year, week } => format!("Week {week}, {year}"),
            TimeKey::Month { year, month } => {
                let name = MONTH_NAMES.get(*month as usize).copied().unwrap_or("???");
                format!("{name} {year}")
            }
            TimeKey::Undated => crate::UNKNOWN_LABEL.to_string(),
        }
    }
}
