//! Dataset loading: extract -> normalize -> coerce for every configured dataset

use serde::{Deserialize, Serialize};

use super::{
    CoercionReport, ColumnRange, DateField, EtlError, HeaderMapping, TypedRecord,
    UtilizationRecord, Workbook, aggregate_utilization, coerce_plan, normalize,
};

/// Where a plan dataset lives in the workbook and which table it replaces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetLayout {
    /// Logical name (config key), e.g. "vacuum"
    #[serde(skip)]
    pub name: String,
    /// Target table, e.g. "vacuum_data"
    pub table: String,
    pub sheet: String,
    /// 0-based row holding the headers
    pub header_row: u32,
    pub columns: ColumnRange,
    #[serde(default)]
    pub date_field: DateField,
    /// Extra header labels on top of the planning workbook defaults
    #[serde(default)]
    pub headers: HeaderMapping,
}

impl DatasetLayout {
    pub fn mapping(&self) -> HeaderMapping {
        HeaderMapping::plan_defaults().merged(&self.headers)
    }
}

/// Where the utilization sheet lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationLayout {
    pub table: String,
    pub sheet: String,
    pub header_row: u32,
    pub columns: ColumnRange,
    #[serde(default)]
    pub headers: HeaderMapping,
}

impl UtilizationLayout {
    pub fn mapping(&self) -> HeaderMapping {
        HeaderMapping::utilization_defaults().merged(&self.headers)
    }
}

/// A plan dataset ready to be written
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub name: String,
    pub table: String,
    pub date_field: DateField,
    pub records: Vec<TypedRecord>,
    pub report: CoercionReport,
}

/// Utilization rows ready to be written
#[derive(Debug, Clone)]
pub struct LoadedUtilization {
    pub table: String,
    pub records: Vec<UtilizationRecord>,
    pub report: CoercionReport,
}

/// Run one dataset through the pipeline
pub fn load_dataset(workbook: &mut Workbook, layout: &DatasetLayout) -> Result<LoadedDataset, EtlError> {
    let raw = workbook.extract(&layout.sheet, layout.header_row, layout.columns)?;
    let normalized = normalize(&raw, &layout.mapping(), &layout.name)?;

    if !normalized.has_field(layout.date_field.field()) {
        log::warn!(
            "dataset '{}': no {} column in {}!{}; every record will count as backlog",
            layout.name,
            layout.date_field.column(),
            layout.sheet,
            layout.columns
        );
    }

    let (records, report) = coerce_plan(&normalized, layout.date_field);
    log::debug!(
        "dataset '{}': {} rows read, {} kept, {} dropped, {} degraded cells",
        layout.name,
        report.rows_seen,
        report.rows_kept,
        report.rows_dropped,
        report.degraded_cells()
    );

    Ok(LoadedDataset {
        name: layout.name.clone(),
        table: layout.table.clone(),
        date_field: layout.date_field,
        records,
        report,
    })
}

/// Run every plan dataset against the same workbook snapshot
///
/// All-or-nothing: the first failing dataset aborts the whole load so the
/// tables never end up reflecting different points in time.
pub fn load_plan_datasets(
    workbook: &mut Workbook,
    layouts: &[DatasetLayout],
) -> Result<Vec<LoadedDataset>, EtlError> {
    layouts.iter().map(|layout| load_dataset(workbook, layout)).collect()
}

pub fn load_utilization(
    workbook: &mut Workbook,
    layout: &UtilizationLayout,
) -> Result<LoadedUtilization, EtlError> {
    let raw = workbook.extract(&layout.sheet, layout.header_row, layout.columns)?;
    let normalized = normalize(&raw, &layout.mapping(), &layout.table)?;
    let (records, report) = aggregate_utilization(&normalized);

    Ok(LoadedUtilization {
        table: layout.table.clone(),
        records,
        report,
    })
}


#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::fixtures::*;
    use super::*;
    use crate::etl::RawCell;

    #[test]
    fn test_load_plan_datasets_from_one_snapshot() {
        let bytes = plan_workbook(
            &[
                ("Red Cannon", "2024-03-05", "WO-1", 2.5, "P-1", 10.0, "Open"),
                ("Yellow Cannon", "2024-03-01", "WO-2", 1.0, "P-2", 4.0, "Open"),
            ],
            &[("Grimme 1", "2024-03-05", "WO-7", 3.0, "P-9", 1.0, "Released")],
        );
        let mut workbook = Workbook::from_bytes(bytes).unwrap();
        let layouts = vec![
            plan_layout("vacuum", "vacuum_data", "A:G"),
            plan_layout("trimming", "trimming_data", "I:O"),
            goods_in_layout(),
        ];

        let loaded = load_plan_datasets(&mut workbook, &layouts).unwrap();
        assert_eq!(loaded.len(), 3);

        let vacuum = &loaded[0];
        assert_eq!(vacuum.records.len(), 2);
        assert_eq!(vacuum.records[0].resource_description.as_deref(), Some("Red Cannon"));
        assert_eq!(vacuum.records[0].date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(vacuum.records[0].total_hours, 2.5);

        let trimming = &loaded[1];
        assert_eq!(trimming.records[0].works_order_number.as_deref(), Some("WO-7"));

        let goods_in = &loaded[2];
        assert_eq!(goods_in.date_field, DateField::FinishDate);
        assert_eq!(goods_in.records[0].wo_status.as_deref(), Some("Received"));
        assert_eq!(goods_in.records[0].date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(goods_in.report.degraded_dates, 0);
    }

    #[test]
    fn test_date_formatted_cell_reads_as_datetime() {
        let mut workbook = Workbook::from_bytes(plan_workbook(&[], &[])).unwrap();
        let rows = workbook
            .extract("Goods In", 0, ColumnRange::parse("A:C").unwrap())
            .unwrap();

        let expected = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(rows.get(0, "FinishDate"), Some(&RawCell::DateTime(expected)));
    }

    #[test]
    fn test_missing_sheet_aborts_everything() {
        let bytes = plan_workbook(&[], &[]);
        let mut workbook = Workbook::from_bytes(bytes).unwrap();
        let mut missing = plan_layout("stores", "stores_data", "A:G");
        missing.sheet = "Stores Prep".to_string();

        let err = load_plan_datasets(
            &mut workbook,
            &[plan_layout("vacuum", "vacuum_data", "A:G"), missing],
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::SheetNotFound { ref sheet, .. } if sheet == "Stores Prep"));
    }

    #[test]
    fn test_load_utilization() {
        let bytes = plan_workbook(&[], &[]);
        let mut workbook = Workbook::from_bytes(bytes).unwrap();
        let loaded = load_utilization(&mut workbook, &utilization_layout()).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.records[0].utilization_pct, 75.0);
    }
}
