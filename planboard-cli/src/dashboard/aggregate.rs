//! Per-machine summary over a plan dataset

use std::cmp::Ordering;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::etl::TypedRecord;

/// Printing status shown when the sheet has none for a row
pub const DEFAULT_PRINTING_STATUS: &str = "Not Printed";

/// How a machine's source name is matched against `resource_description`
///
/// Both sides are trimmed and compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "name", rename_all = "snake_case")]
pub enum ResourceMatch {
    Exact(String),
    /// Used where the machine appears inside a longer descriptive label
    Contains(String),
}

impl ResourceMatch {
    pub fn matches(&self, resource: &str) -> bool {
        let resource = resource.trim().to_lowercase();
        match self {
            ResourceMatch::Exact(name) => resource == name.trim().to_lowercase(),
            ResourceMatch::Contains(pattern) => resource.contains(&pattern.trim().to_lowercase()),
        }
    }
}

/// One work order as displayed on a dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkOrderView {
    /// `DD-MM-YY`, or empty when the row has no date
    pub start_date: String,
    pub work_order_number: Option<String>,
    pub part_number: Option<String>,
    pub total_hours_required: f64,
    pub parts_qty: f64,
    pub wo_status: Option<String>,
    pub printing_status: String,
    pub is_backlog: bool,
}

/// Derived view over one dataset; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_work_orders: usize,
    pub total_today: usize,
    pub total_backlog: usize,
    pub work_orders: Vec<WorkOrderView>,
}

impl DashboardSummary {
    pub fn is_empty(&self) -> bool {
        self.total_work_orders == 0
    }
}

/// Newest first; undated rows go last
fn by_date_desc(a: &Option<NaiveDate>, b: &Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Backlog means "not exactly the reference date", so future-dated and
/// undated rows are backlog too
pub fn is_backlog(date: Option<NaiveDate>, reference: NaiveDate) -> bool {
    date != Some(reference)
}

/// Summarize the records matching `filter` against `reference`
///
/// `total_work_orders == total_today + total_backlog` holds by construction.
pub fn summarize(
    records: &[TypedRecord],
    filter: Option<&ResourceMatch>,
    reference: NaiveDate,
) -> DashboardSummary {
    let mut rows: Vec<&TypedRecord> = records
        .iter()
        .filter(|r| match filter {
            Some(f) => r.resource_description.as_deref().is_some_and(|d| f.matches(d)),
            None => true,
        })
        .collect();

    let total_work_orders = rows.len();
    let total_today = rows.iter().filter(|r| r.date == Some(reference)).count();
    let total_backlog = total_work_orders - total_today;

    // Stable sort keeps sheet order within a day
    rows.sort_by(|a, b| by_date_desc(&a.date, &b.date));

    let work_orders = rows
        .into_iter()
        .map(|r| WorkOrderView {
            start_date: r
                .date
                .map(|d| d.format("%d-%m-%y").to_string())
                .unwrap_or_default(),
            work_order_number: r.works_order_number.clone(),
            part_number: r.part_number.clone(),
            total_hours_required: r.total_hours,
            parts_qty: r.parts_qty,
            wo_status: r.wo_status.clone(),
            printing_status: r
                .printing_status
                .clone()
                .unwrap_or_else(|| DEFAULT_PRINTING_STATUS.to_string()),
            is_backlog: is_backlog(r.date, reference),
        })
        .collect();

    DashboardSummary {
        total_work_orders,
        total_today,
        total_backlog,
        work_orders,
    }
}
