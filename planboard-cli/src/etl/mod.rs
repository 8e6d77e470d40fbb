//! Workbook-to-relational transform
//!
//! A refresh runs each configured dataset through the same pipeline:
//! - [`extract`]: cut a header row and column block out of a sheet as found
//! - [`normalize`]: map raw headers onto [`CanonicalField`]s
//! - [`coerce`]: type the cells, dropping only fully blank rows
//!
//! [`loader`] strings the steps together per dataset; [`utilization`] is the
//! grouped planned/actual variant used for the machine utilization sheet.

pub mod coerce;
pub mod error;
pub mod extract;
pub mod fields;
pub mod loader;
pub mod normalize;
pub mod utilization;

pub use coerce::{
    CoercionReport, TypedRecord, coerce_number, coerce_plan, coerce_text, parse_date_text,
};
pub use error::EtlError;
pub use extract::{ColumnRange, RawCell, RawRowSet, Workbook};
pub use fields::{CanonicalField, DateField};
pub use loader::{
    DatasetLayout, LoadedDataset, LoadedUtilization, UtilizationLayout, load_plan_datasets,
    load_utilization,
};
pub use normalize::{HeaderMapping, NormalizedRowSet, normalize};
pub use utilization::{UtilizationRecord, aggregate_utilization};
