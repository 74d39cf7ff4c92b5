//! Report facade
//!
//! Summary, breakdown and success-rate queries consumed by dashboards.

#![warn(missing_docs)]

pub mod facade;
pub mod service;

pub use facade::{
    breakdown, due_today, monthly_breakdown, rate_table, status_counts, success_rates, summarize,
    summary, weekly_breakdown, with_status, Summary,
};
pub use service::{BasicReportService, ReportConfig, ReportService, ReportSnapshot};
