//! Column normalization: raw spreadsheet headers -> canonical fields

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::{CanonicalField, EtlError, RawCell, RawRowSet};

/// Suffix a spreadsheet reader appends to repeated headers ("WO Status.2")
static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\d+$").expect("ordinal suffix pattern is valid"));

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Declared raw-label -> canonical-field mapping for a dataset
///
/// Labels are compared after trimming and case-folding, so `"Part Number"`
/// and `"part number "` resolve to the same entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, CanonicalField>", into = "BTreeMap<String, CanonicalField>")]
pub struct HeaderMapping {
    entries: BTreeMap<String, CanonicalField>,
}

impl HeaderMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels used by the production planning workbook
    pub fn plan_defaults() -> Self {
        Self::new()
            .with("Production Resources.ResourceDescription", CanonicalField::ResourceDescription)
            .with("ResourceDescription", CanonicalField::ResourceDescription)
            .with("StartDate", CanonicalField::StartDate)
            .with("FinishDate", CanonicalField::FinishDate)
            .with("WorksOrderNumber", CanonicalField::WorksOrderNumber)
            .with("Sum of TotalHours", CanonicalField::TotalHours)
            .with("TotalHours", CanonicalField::TotalHours)
            .with("Part Number", CanonicalField::PartNumber)
            .with("PartNumber", CanonicalField::PartNumber)
            .with("Parts Qty", CanonicalField::PartsQty)
            .with("PartsQty", CanonicalField::PartsQty)
            .with("WO Status", CanonicalField::WoStatus)
            .with("Printing Status", CanonicalField::PrintingStatus)
    }

    /// Labels used by the machine utilization sheet
    pub fn utilization_defaults() -> Self {
        Self::new()
            .with("Booking Week", CanonicalField::BookingWeek)
            .with("BookingWeek", CanonicalField::BookingWeek)
            .with("Resource", CanonicalField::ResourceDescription)
            .with("ResourceDescription", CanonicalField::ResourceDescription)
            .with("Plan Hours", CanonicalField::PlannedHours)
            .with("Planned Hours", CanonicalField::PlannedHours)
            .with("Actual Hours", CanonicalField::ActualHours)
    }

    pub fn with(mut self, label: &str, field: CanonicalField) -> Self {
        self.insert(label, field);
        self
    }

    pub fn insert(&mut self, label: &str, field: CanonicalField) {
        self.entries.insert(fold(label), field);
    }

    /// Entries of `other` win over ours
    pub fn merged(mut self, other: &HeaderMapping) -> Self {
        for (label, field) in &other.entries {
            self.entries.insert(label.clone(), *field);
        }
        self
    }

    pub fn get(&self, label: &str) -> Option<CanonicalField> {
        self.entries.get(&fold(label)).copied()
    }
}

impl From<BTreeMap<String, CanonicalField>> for HeaderMapping {
    fn from(map: BTreeMap<String, CanonicalField>) -> Self {
        let mut mapping = HeaderMapping::new();
        for (label, field) in map {
            mapping.insert(&label, field);
        }
        mapping
    }
}

impl From<HeaderMapping> for BTreeMap<String, CanonicalField> {
    fn from(mapping: HeaderMapping) -> Self {
        mapping.entries
    }
}

fn fold(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Normalize one header to its canonical spelling
///
/// Trims, strips a trailing `.<digits>`, applies the mapping, and otherwise
/// lower-cases with whitespace runs turned into underscores. Normalizing an
/// already-canonical header returns it unchanged.
pub fn normalize_header(raw: &str, mapping: &HeaderMapping) -> String {
    let trimmed = raw.trim();
    let stripped = ORDINAL_SUFFIX.replace(trimmed, "");
    let stripped = stripped.trim();

    if let Some(field) = mapping.get(stripped) {
        return field.as_str().to_string();
    }

    WHITESPACE.replace_all(&stripped.to_lowercase(), "_").into_owned()
}

/// Row set keyed by canonical fields; columns that did not resolve to a
/// canonical field have been dropped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRowSet {
    pub fields: Vec<CanonicalField>,
    pub rows: Vec<Vec<RawCell>>,
}

impl NormalizedRowSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn has_field(&self, field: CanonicalField) -> bool {
        self.fields.contains(&field)
    }

    /// Cell for `field` in `row`; `None` when the dataset has no such column
    pub fn get(&self, row: usize, field: CanonicalField) -> Option<&RawCell> {
        let col = self.fields.iter().position(|f| *f == field)?;
        self.rows.get(row)?.get(col)
    }
}

/// Rewrite a raw row set onto canonical fields
///
/// Fails when two raw headers land on the same canonical field, since there
/// is no way to tell which one holds the data.
pub fn normalize(
    raw: &RawRowSet,
    mapping: &HeaderMapping,
    dataset: &str,
) -> Result<NormalizedRowSet, EtlError> {
    let mut kept: Vec<(usize, CanonicalField)> = Vec::new();
    let mut sources: HashMap<CanonicalField, Vec<String>> = HashMap::new();

    for (col, header) in raw.headers.iter().enumerate() {
        let name = normalize_header(header, mapping);
        let Some(field) = CanonicalField::from_name(&name) else {
            log::debug!("dataset '{}': dropping unmapped column '{}'", dataset, header);
            continue;
        };
        sources.entry(field).or_default().push(header.clone());
        kept.push((col, field));
    }

    // Report the first collision in column order so the message is stable
    for (_, field) in &kept {
        if let Some(raw_headers) = sources.get(field).filter(|h| h.len() > 1) {
            return Err(EtlError::DuplicateColumn {
                dataset: dataset.to_string(),
                field: *field,
                raw_headers: raw_headers.clone(),
            });
        }
    }

    let rows = raw
        .rows
        .iter()
        .map(|row| {
            kept.iter()
                .map(|(col, _)| row.get(*col).cloned().unwrap_or(RawCell::Empty))
                .collect()
        })
        .collect();

    Ok(NormalizedRowSet {
        fields: kept.into_iter().map(|(_, f)| f).collect(),
        rows,
    })
}
