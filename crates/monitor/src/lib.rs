//! Monitoring workflow
//!
//! Owner-facing operations that load a record, run it through the
//! lifecycle rules and persist the result.

#![warn(missing_docs)]

pub mod manager;

pub use manager::{BasicMonitorManager, MonitorError, MonitorManager, Result, Transition};
