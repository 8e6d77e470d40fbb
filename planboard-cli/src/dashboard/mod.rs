//! Dashboard views derived from the stored plan tables

pub mod aggregate;
pub mod service;

pub use aggregate::{DashboardSummary, ResourceMatch, summarize};
pub use service::{MachineOverview, SummaryLookup, lookup_summary, machine_overview};
