//! Errors raised while turning a workbook into datasets
//!
//! Everything here aborts the refresh it occurs in. Cell-level problems never
//! show up as an error; they degrade to defaults and are counted in
//! [`super::CoercionReport`].

use thiserror::Error;

use super::CanonicalField;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("workbook could not be read: {0}")]
    WorkbookUnreadable(String),

    #[error("sheet '{sheet}' not found in workbook (available: {available})")]
    SheetNotFound { sheet: String, available: String },

    #[error("column range {range} is invalid for sheet '{sheet}': {reason}")]
    ColumnRangeInvalid {
        sheet: String,
        range: String,
        reason: String,
    },

    #[error("header row {row} is past the last populated row of sheet '{sheet}'")]
    HeaderRowMissing { sheet: String, row: u32 },

    #[error(
        "dataset '{dataset}': headers {} all normalize to '{field}'",
        raw_headers.iter().map(|h| format!("'{}'", h)).collect::<Vec<_>>().join(", ")
    )]
    DuplicateColumn {
        dataset: String,
        field: CanonicalField,
        raw_headers: Vec<String>,
    },
}
