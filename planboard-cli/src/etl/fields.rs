//! Canonical field names shared by every dataset
//!
//! Column names are only ever derived here. Extraction produces raw labels,
//! the normalizer maps them onto these variants, and everything downstream
//! (coercion, persistence, aggregation) addresses columns through this enum.

use serde::{Deserialize, Serialize};

/// A normalized column name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    StartDate,
    FinishDate,
    WorksOrderNumber,
    PartNumber,
    TotalHours,
    PartsQty,
    WoStatus,
    ResourceDescription,
    PrintingStatus,
    BookingWeek,
    PlannedHours,
    ActualHours,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 12] = [
        CanonicalField::StartDate,
        CanonicalField::FinishDate,
        CanonicalField::WorksOrderNumber,
        CanonicalField::PartNumber,
        CanonicalField::TotalHours,
        CanonicalField::PartsQty,
        CanonicalField::WoStatus,
        CanonicalField::ResourceDescription,
        CanonicalField::PrintingStatus,
        CanonicalField::BookingWeek,
        CanonicalField::PlannedHours,
        CanonicalField::ActualHours,
    ];

    /// Column name used in normalized row sets and in the store
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::StartDate => "start_date",
            CanonicalField::FinishDate => "finish_date",
            CanonicalField::WorksOrderNumber => "works_order_number",
            CanonicalField::PartNumber => "part_number",
            CanonicalField::TotalHours => "total_hours",
            CanonicalField::PartsQty => "parts_qty",
            CanonicalField::WoStatus => "wo_status",
            CanonicalField::ResourceDescription => "resource_description",
            CanonicalField::PrintingStatus => "printing_status",
            CanonicalField::BookingWeek => "booking_week",
            CanonicalField::PlannedHours => "planned_hours",
            CanonicalField::ActualHours => "actual_hours",
        }
    }

    /// Look up a field by its canonical name (exact match)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.as_str() == name)
    }

    pub fn is_date(&self) -> bool {
        matches!(self, CanonicalField::StartDate | CanonicalField::FinishDate)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            CanonicalField::TotalHours
                | CanonicalField::PartsQty
                | CanonicalField::PlannedHours
                | CanonicalField::ActualHours
        )
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which date column a plan dataset is keyed on
///
/// Goods-in is tracked by when the order finished; every other dataset by
/// when it is planned to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    #[default]
    StartDate,
    FinishDate,
}

impl DateField {
    pub fn field(&self) -> CanonicalField {
        match self {
            DateField::StartDate => CanonicalField::StartDate,
            DateField::FinishDate => CanonicalField::FinishDate,
        }
    }

    pub fn column(&self) -> &'static str {
        self.field().as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_round_trips_every_variant() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_name(field.as_str()), Some(field));
        }
        assert_eq!(CanonicalField::from_name("StartDate"), None);
        assert_eq!(CanonicalField::from_name("startdate"), None);
    }

    #[test]
    fn test_date_field_columns() {
        assert_eq!(DateField::StartDate.column(), "start_date");
        assert_eq!(DateField::FinishDate.column(), "finish_date");
        assert!(DateField::FinishDate.field().is_date());
        assert!(!CanonicalField::PartsQty.is_date());
        assert!(CanonicalField::PartsQty.is_numeric());
    }
}
