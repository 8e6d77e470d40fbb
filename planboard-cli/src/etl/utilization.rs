//! Machine utilization: planned vs actual hours per booking week and resource

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{CanonicalField, CoercionReport, NormalizedRowSet, RawCell, coerce_number, coerce_text};

/// One (booking week, resource) group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationRecord {
    pub booking_week: String,
    pub resource: String,
    pub planned_hours: f64,
    pub actual_hours: f64,
    /// `actual / planned * 100`, two decimals; 0 when nothing was planned
    pub utilization_pct: f64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn utilization_pct(planned: f64, actual: f64) -> f64 {
    if planned > 0.0 {
        round2(actual / planned * 100.0)
    } else {
        0.0
    }
}

/// Week keys read as dates are written ISO-formatted so they sort
fn week_key(cell: &RawCell) -> Option<String> {
    match cell {
        RawCell::DateTime(dt) => Some(dt.format("%Y-%m-%d").to_string()),
        RawCell::Text(s) => super::parse_date_text(s.trim())
            .map(|d: NaiveDate| d.format("%Y-%m-%d").to_string())
            .or_else(|| coerce_text(cell).map(|t| t.trim().to_string())),
        other => coerce_text(other),
    }
}

/// Group rows by booking week and resource, summing hours
///
/// Rows without a week or a resource cannot be attributed and are dropped.
pub fn aggregate_utilization(rows: &NormalizedRowSet) -> (Vec<UtilizationRecord>, CoercionReport) {
    let mut report = CoercionReport {
        rows_seen: rows.row_count(),
        ..Default::default()
    };
    let mut groups: BTreeMap<(String, String), (f64, f64)> = BTreeMap::new();

    for idx in 0..rows.row_count() {
        let cell = |field: CanonicalField| rows.get(idx, field).cloned().unwrap_or(RawCell::Empty);

        let week = week_key(&cell(CanonicalField::BookingWeek));
        let resource = coerce_text(&cell(CanonicalField::ResourceDescription))
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let (Some(week), Some(resource)) = (week, resource) else {
            report.rows_dropped += 1;
            continue;
        };

        let planned = coerce_number(&cell(CanonicalField::PlannedHours));
        let actual = coerce_number(&cell(CanonicalField::ActualHours));
        report.degraded_numbers += planned.is_degraded() as usize + actual.is_degraded() as usize;

        let entry = groups.entry((week, resource)).or_insert((0.0, 0.0));
        entry.0 += planned.value().unwrap_or(0.0);
        entry.1 += actual.value().unwrap_or(0.0);
        report.rows_kept += 1;
    }

    let records = groups
        .into_iter()
        .map(|((booking_week, resource), (planned, actual))| UtilizationRecord {
            booking_week,
            resource,
            planned_hours: round2(planned),
            actual_hours: round2(actual),
            utilization_pct: utilization_pct(planned, actual),
        })
        .collect();

    (records, report)
}
