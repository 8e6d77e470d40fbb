//! Command handlers

pub mod machines;
pub mod output;
pub mod refresh;
pub mod summary;
pub mod utilization;

pub use output::OutputFormat;
