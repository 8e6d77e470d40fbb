//! Type coercion: normalized cells -> typed records
//!
//! Coercion never fails. Dates that cannot be read become `None`, numbers
//! that cannot be read become `0.0`, and each such cell is counted in the
//! [`CoercionReport`] so a refresh can log how much of the sheet was unusable.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::{CanonicalField, DateField, NormalizedRowSet, RawCell};

/// Day 0 of the spreadsheet serial date system (1900 system, with the
/// 1900 leap-year bug folded in)
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

/// Largest serial that is still a valid date (9999-12-31)
const MAX_SERIAL: f64 = 2_958_465.0;

/// Formats tried when the text starts with a four digit year
const YEAR_FIRST_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
    "%Y/%m/%d",
];

/// Day-first formats; two digit years are tried before four digit ones so
/// "05-03-24" is not read as the year 24
const DAY_FIRST_FORMATS: &[&str] = &[
    "%d/%m/%y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d/%m/%y",
    "%d/%m/%Y",
    "%d-%m-%y",
    "%d-%m-%Y",
    "%d.%m.%y",
    "%d.%m.%Y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
];

/// Result of coercing one cell
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced<T> {
    /// Cell was blank
    Missing,
    Value(T),
    /// Cell held something that could not be read as `T`
    Degraded,
}

impl<T> Coerced<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Coerced::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Coerced::Degraded)
    }
}

/// Read a cell as a calendar date
pub fn coerce_date(cell: &RawCell) -> Coerced<NaiveDate> {
    match cell {
        c if c.is_blank() => Coerced::Missing,
        RawCell::DateTime(dt) => Coerced::Value(dt.date()),
        RawCell::Number(n) => match serial_to_date(*n) {
            Some(d) => Coerced::Value(d),
            None => Coerced::Degraded,
        },
        RawCell::Text(s) => match parse_date_text(s.trim()) {
            Some(d) => Coerced::Value(d),
            None => Coerced::Degraded,
        },
        _ => Coerced::Degraded,
    }
}

/// Permissive date parsing for text cells
pub fn parse_date_text(text: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.date_naive());
    }
    let year_first = text.len() > 4 && text.as_bytes()[..4].iter().all(u8::is_ascii_digit);
    let formats = if year_first {
        YEAR_FIRST_FORMATS
    } else {
        DAY_FIRST_FORMATS
    };
    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(text, fmt)
            .map(|dt| dt.date())
            .or_else(|_| NaiveDate::parse_from_str(text, fmt))
            .ok()
    })
}

fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_SERIAL {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Read a cell as a non-negative decimal
pub fn coerce_number(cell: &RawCell) -> Coerced<f64> {
    let parsed = match cell {
        c if c.is_blank() => return Coerced::Missing,
        RawCell::Number(n) => Some(*n),
        RawCell::Text(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) if n.is_finite() && n >= 0.0 => Coerced::Value(n),
        _ => Coerced::Degraded,
    }
}

/// Read a cell as free text
///
/// Whole numbers are rendered without a fractional part so numeric order
/// numbers read back the way they were typed.
pub fn coerce_text(cell: &RawCell) -> Option<String> {
    match cell {
        c if c.is_blank() => None,
        RawCell::Text(s) => Some(s.clone()),
        RawCell::Number(n) => Some(format_number(*n)),
        RawCell::Bool(b) => Some(b.to_string()),
        RawCell::DateTime(dt) => Some(dt.format("%Y-%m-%d").to_string()),
        RawCell::Error(_) | RawCell::Empty => None,
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// One typed row of a plan dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedRecord {
    /// Start date, or finish date for goods-in
    pub date: Option<NaiveDate>,
    pub works_order_number: Option<String>,
    pub part_number: Option<String>,
    pub total_hours: f64,
    pub parts_qty: f64,
    pub wo_status: Option<String>,
    pub resource_description: Option<String>,
    pub printing_status: Option<String>,
}

/// Counters for one coercion pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoercionReport {
    pub rows_seen: usize,
    pub rows_kept: usize,
    /// Rows where every relevant field was blank
    pub rows_dropped: usize,
    pub degraded_dates: usize,
    pub degraded_numbers: usize,
}

impl CoercionReport {
    pub fn degraded_cells(&self) -> usize {
        self.degraded_dates + self.degraded_numbers
    }

    pub fn absorb(&mut self, other: &CoercionReport) {
        self.rows_seen += other.rows_seen;
        self.rows_kept += other.rows_kept;
        self.rows_dropped += other.rows_dropped;
        self.degraded_dates += other.degraded_dates;
        self.degraded_numbers += other.degraded_numbers;
    }
}

/// Coerce every row of a plan dataset
///
/// A row is dropped only when date, order number, part number, hours,
/// quantity and status are all blank; any one of them keeps it.
pub fn coerce_plan(rows: &NormalizedRowSet, date_field: DateField) -> (Vec<TypedRecord>, CoercionReport) {
    let relevant = [
        date_field.field(),
        CanonicalField::WorksOrderNumber,
        CanonicalField::PartNumber,
        CanonicalField::TotalHours,
        CanonicalField::PartsQty,
        CanonicalField::WoStatus,
    ];

    let mut report = CoercionReport {
        rows_seen: rows.row_count(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(rows.row_count());

    for idx in 0..rows.row_count() {
        let cell = |field: CanonicalField| rows.get(idx, field).cloned().unwrap_or(RawCell::Empty);

        if relevant.iter().all(|f| cell(*f).is_blank()) {
            report.rows_dropped += 1;
            continue;
        }

        let date = coerce_date(&cell(date_field.field()));
        let hours = coerce_number(&cell(CanonicalField::TotalHours));
        let qty = coerce_number(&cell(CanonicalField::PartsQty));

        if date.is_degraded() {
            report.degraded_dates += 1;
        }
        report.degraded_numbers += hours.is_degraded() as usize + qty.is_degraded() as usize;

        records.push(TypedRecord {
            date: date.value(),
            works_order_number: coerce_text(&cell(CanonicalField::WorksOrderNumber)),
            part_number: coerce_text(&cell(CanonicalField::PartNumber)),
            total_hours: hours.value().unwrap_or(0.0),
            parts_qty: qty.value().unwrap_or(0.0),
            wo_status: coerce_text(&cell(CanonicalField::WoStatus)),
            resource_description: coerce_text(&cell(CanonicalField::ResourceDescription)),
            printing_status: coerce_text(&cell(CanonicalField::PrintingStatus)),
        });
    }

    report.rows_kept = records.len();
    (records, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> RawCell {
        RawCell::Text(s.to_string())
    }

    fn plan_rows(rows: Vec<Vec<RawCell>>) -> NormalizedRowSet {
        NormalizedRowSet {
            fields: vec![
                CanonicalField::StartDate,
                CanonicalField::WorksOrderNumber,
                CanonicalField::PartNumber,
                CanonicalField::TotalHours,
                CanonicalField::PartsQty,
                CanonicalField::WoStatus,
                CanonicalField::ResourceDescription,
            ],
            rows,
        }
    }

    #[test]
    fn test_iso_date_formats_day_first() {
        let date = coerce_date(&text("2024-03-05")).value().unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_eq!(date.format("%d-%m-%y").to_string(), "05-03-24");
    }

    #[test]
    fn test_permissive_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        for input in [
            "2024-03-05 00:00:00",
            "2024-03-05T08:30:00",
            "05/03/2024",
            "05-03-24",
            "2024-03-05T08:30:00+01:00",
        ] {
            assert_eq!(coerce_date(&text(input)), Coerced::Value(expected), "{input}");
        }
        assert_eq!(coerce_date(&RawCell::Number(45356.0)), Coerced::Value(expected));
        assert_eq!(coerce_date(&text("next tuesday")), Coerced::Degraded);
        assert_eq!(coerce_date(&RawCell::Empty), Coerced::Missing);
        assert_eq!(coerce_date(&RawCell::Number(-3.0)), Coerced::Degraded);
    }

    #[test]
    fn test_numbers_default_to_zero() {
        assert_eq!(coerce_number(&text("1,250.5")), Coerced::Value(1250.5));
        assert_eq!(coerce_number(&text("lots")), Coerced::Degraded);
        assert_eq!(coerce_number(&RawCell::Number(-2.0)), Coerced::Degraded);
        assert_eq!(coerce_number(&RawCell::Empty), Coerced::Missing);

        let rows = plan_rows(vec![vec![
            text("2024-03-05"),
            text("WO-1"),
            RawCell::Empty,
            RawCell::Number(3.5),
            text("n/a"),
            RawCell::Empty,
            text("Red Cannon"),
        ]]);
        let (records, report) = coerce_plan(&rows, DateField::StartDate);
        assert_eq!(records[0].parts_qty, 0.0);
        assert_eq!(records[0].total_hours, 3.5);
        assert_eq!(report.degraded_numbers, 1);
    }

    #[test]
    fn test_text_rendering() {
        assert_eq!(coerce_text(&RawCell::Number(102345.0)), Some("102345".to_string()));
        assert_eq!(coerce_text(&RawCell::Number(1.5)), Some("1.5".to_string()));
        assert_eq!(coerce_text(&text("  ")), None);
        assert_eq!(coerce_text(&RawCell::Error("#N/A".into())), None);
    }

    #[test]
    fn test_row_retention() {
        let blank = vec![RawCell::Empty; 7];
        let mut status_only = vec![RawCell::Empty; 7];
        status_only[5] = text("Complete");
        // Resource alone does not count as a relevant field
        let mut resource_only = vec![RawCell::Empty; 7];
        resource_only[6] = text("Grimme 1");

        let rows = plan_rows(vec![status_only, blank, resource_only]);
        let (records, report) = coerce_plan(&rows, DateField::StartDate);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].wo_status.as_deref(), Some("Complete"));
        assert_eq!(records[0].date, None);
        assert_eq!(records[0].parts_qty, 0.0);
        assert_eq!(report.rows_seen, 3);
        assert_eq!(report.rows_dropped, 2);
        assert_eq!(report.degraded_cells(), 0);
    }

    #[test]
    fn test_finish_date_dataset() {
        let rows = NormalizedRowSet {
            fields: vec![CanonicalField::FinishDate, CanonicalField::WorksOrderNumber],
            rows: vec![vec![text("2024-01-09"), text("WO-9")]],
        };
        let (records, _) = coerce_plan(&rows, DateField::FinishDate);
        assert_eq!(records[0].date, NaiveDate::from_ymd_opt(2024, 1, 9));
    }
}
