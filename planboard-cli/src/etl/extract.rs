//! Sheet extraction: pull a rectangular block out of a workbook as found
//!
//! All row/column positions are absolute, 0-based sheet coordinates (A1 is
//! `(0, 0)`), matching how the planning workbook is described: "header on
//! Excel row 12, columns M:S" becomes `header_row = 11, columns = M:S`.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Data, Range, Reader, Sheets, open_workbook_auto_from_rs};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::EtlError;

/// A single cell value as it was found in the sheet
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl RawCell {
    /// Blank cells and whitespace-only text count as empty
    pub fn is_blank(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Data> for RawCell {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => RawCell::Empty,
            Data::String(s) => RawCell::Text(s.clone()),
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Float(f) => RawCell::Number(*f),
            Data::Bool(b) => RawCell::Bool(*b),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(ndt) => RawCell::DateTime(ndt),
                None => RawCell::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) => RawCell::Text(s.clone()),
            Data::DurationIso(s) => RawCell::Text(s.clone()),
            Data::Error(e) => RawCell::Error(e.to_string()),
        }
    }
}

/// Rows of one dataset keyed by raw column label
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRowSet {
    /// Raw labels, one per extracted column
    pub headers: Vec<String>,
    /// Cells in header order; every row has `headers.len()` cells
    pub rows: Vec<Vec<RawCell>>,
}

#[cfg(test)]
impl RawRowSet {
    fn len(&self) -> usize {
        self.rows.len()
    }

    /// Cell under a raw label
    pub(crate) fn get(&self, row: usize, label: &str) -> Option<&RawCell> {
        let col = self.headers.iter().position(|h| h == label)?;
        self.rows.get(row)?.get(col)
    }
}

/// Inclusive range of sheet columns, 0-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColumnRange {
    pub first: u32,
    pub last: u32,
}

impl ColumnRange {
    pub fn new(first: u32, last: u32) -> Result<Self, String> {
        if first > last {
            return Err(format!(
                "first column {} is after last column {}",
                column_letters(first),
                column_letters(last)
            ));
        }
        Ok(Self { first, last })
    }

    /// Parse a spreadsheet-style range such as `"M:S"` or `"X:AD"`
    pub fn parse(text: &str) -> Result<Self, String> {
        let (start, end) = text
            .split_once(':')
            .ok_or_else(|| format!("expected FIRST:LAST column letters, got '{}'", text))?;
        Self::new(column_index(start)?, column_index(end)?)
    }

    pub fn width(&self) -> u32 {
        self.last - self.first + 1
    }

    pub fn columns(&self) -> std::ops::RangeInclusive<u32> {
        self.first..=self.last
    }
}

impl TryFrom<String> for ColumnRange {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ColumnRange> for String {
    fn from(range: ColumnRange) -> Self {
        range.to_string()
    }
}

impl std::fmt::Display for ColumnRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", column_letters(self.first), column_letters(self.last))
    }
}

/// "A" -> 0, "Z" -> 25, "AA" -> 26
fn column_index(letters: &str) -> Result<u32, String> {
    let letters = letters.trim();
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("'{}' is not a column reference", letters));
    }
    let mut index: u32 = 0;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        index = index
            .checked_mul(26)
            .and_then(|i| i.checked_add(digit))
            .ok_or_else(|| format!("column '{}' is out of range", letters))?;
    }
    Ok(index - 1)
}

fn column_letters(index: u32) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

/// One fetched spreadsheet snapshot
///
/// Parsed sheets are cached so several datasets can be cut from the same
/// sheet without decoding it again.
pub struct Workbook {
    sheets: Sheets<Cursor<Vec<u8>>>,
    ranges: HashMap<String, Range<Data>>,
}

impl Workbook {
    /// Open a workbook from raw file bytes (xlsx, xlsm, xlsb, xls or ods)
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, EtlError> {
        let sheets = open_workbook_auto_from_rs(Cursor::new(bytes))
            .map_err(|e| EtlError::WorkbookUnreadable(e.to_string()))?;
        Ok(Self {
            sheets,
            ranges: HashMap::new(),
        })
    }

    fn sheet_range(&mut self, sheet: &str) -> Result<&Range<Data>, EtlError> {
        if !self.ranges.contains_key(sheet) {
            let names = self.sheets.sheet_names();
            if !names.iter().any(|n| n == sheet) {
                return Err(EtlError::SheetNotFound {
                    sheet: sheet.to_string(),
                    available: names.join(", "),
                });
            }
            let range = self
                .sheets
                .worksheet_range(sheet)
                .map_err(|e| EtlError::WorkbookUnreadable(format!("sheet '{}': {}", sheet, e)))?;
            self.ranges.insert(sheet.to_string(), range);
        }
        self.ranges
            .get(sheet)
            .ok_or_else(|| EtlError::WorkbookUnreadable(format!("sheet '{}' vanished", sheet)))
    }

    /// Extract a dataset from a sheet, starting immediately below `header_row`
    pub fn extract(
        &mut self,
        sheet: &str,
        header_row: u32,
        columns: ColumnRange,
    ) -> Result<RawRowSet, EtlError> {
        let range = self.sheet_range(sheet)?;
        extract_range(range, sheet, header_row, columns)
    }
}

/// Extract from an already decoded sheet
///
/// Fully blank rows are kept; filtering them is left to coercion.
pub fn extract_range(
    range: &Range<Data>,
    sheet: &str,
    header_row: u32,
    columns: ColumnRange,
) -> Result<RawRowSet, EtlError> {
    let (last_row, last_col) = match range.end() {
        Some(end) if !range.is_empty() => end,
        _ => {
            return Err(EtlError::ColumnRangeInvalid {
                sheet: sheet.to_string(),
                range: columns.to_string(),
                reason: "sheet has no populated columns".to_string(),
            });
        }
    };

    if columns.last > last_col {
        return Err(EtlError::ColumnRangeInvalid {
            sheet: sheet.to_string(),
            range: columns.to_string(),
            reason: format!(
                "sheet only has {} columns (up to {})",
                last_col + 1,
                column_letters(last_col)
            ),
        });
    }

    if header_row > last_row {
        return Err(EtlError::HeaderRowMissing {
            sheet: sheet.to_string(),
            row: header_row,
        });
    }

    let cell = |row: u32, col: u32| -> RawCell {
        range
            .get_value((row, col))
            .map(RawCell::from)
            .unwrap_or(RawCell::Empty)
    };

    let labels: Vec<String> = columns
        .columns()
        .enumerate()
        .map(|(i, col)| {
            let label = match range.get_value((header_row, col)) {
                Some(Data::Empty) | None => String::new(),
                Some(data) => data.to_string(),
            };
            if label.trim().is_empty() {
                format!("Unnamed: {}", i)
            } else {
                label
            }
        })
        .collect();
    let headers = disambiguate(labels);

    let rows = ((header_row + 1)..=last_row)
        .map(|row| columns.columns().map(|col| cell(row, col)).collect())
        .collect();

    Ok(RawRowSet { headers, rows })
}

/// Repeated labels get `.1`, `.2`, ... appended; the first keeps its label
fn disambiguate(labels: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    labels
        .into_iter()
        .map(|label| {
            let count = seen.entry(label.clone()).or_insert(0);
            let out = if *count == 0 {
                label.clone()
            } else {
                format!("{}.{}", label, count)
            };
            *count += 1;
            out
        })
        .collect()
}
