//! Status reporting
//!
//! Read-only snapshots of hub state for monitoring. Nothing here is on the
//! broadcast path.

pub mod report;

pub use report::ReportingStatus;
