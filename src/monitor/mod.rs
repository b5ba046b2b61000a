//! Usage monitoring: one-shot probes, severity tiers, and status reports.

pub mod report;
pub mod severity;
pub mod usage;
