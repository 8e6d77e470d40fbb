//! Output formatting shared by the view commands

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to format JSON output")
}

/// One CSV record per item, header taken from the field names
pub fn to_csv<T: Serialize>(items: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for item in items {
        writer.serialize(item).context("Failed to write CSV row")?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

/// Left-aligned text table
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    styled_table(headers, rows, |_, _, padded| padded)
}

/// Like [`table`], with `paint(row, column, padded)` applied to each body
/// cell after padding
///
/// Widths are measured on the plain cells, so escape codes added by `paint`
/// never shift the columns.
pub fn styled_table<F>(headers: &[&str], rows: &[Vec<String>], paint: F) -> String
where
    F: Fn(&[String], usize, String) -> String,
{
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let pad = |cell: &str, width: usize| format!("{:<width$}", cell, width = width);
    let join = |cells: Vec<String>| cells.join("  ").trim_end().to_string();

    let mut out = vec![join(headers.iter().zip(&widths).map(|(h, w)| pad(h, *w)).collect())];
    out.push(join(widths.iter().map(|w| "-".repeat(*w)).collect()));
    for row in rows {
        out.push(join(
            row.iter()
                .zip(&widths)
                .enumerate()
                .map(|(col, (cell, width))| paint(row, col, pad(cell, *width)))
                .collect(),
        ));
    }
    out.join("\n")
}

/// Hours and quantities without a trailing `.0`
pub fn number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        name: &'static str,
        hours: f64,
    }

    #[test]
    fn test_table_alignment() {
        let out = table(
            &["Machine", "WOs"],
            &[
                vec!["Red Cannon".into(), "12".into()],
                vec!["UNO".into(), "3".into()],
            ],
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Machine     WOs");
        assert_eq!(lines[1], "----------  ---");
        assert_eq!(lines[3], "UNO         3");
    }

    #[test]
    fn test_painted_cells_keep_alignment() {
        let rows = vec![
            vec!["succeeded".to_string(), "12".to_string()],
            vec!["failed".to_string(), "0".to_string()],
        ];
        let out = styled_table(&["Status", "Rows"], &rows, |row, col, padded| {
            if col == 0 && row[0] == "failed" {
                format!("\x1b[31m{}\x1b[0m", padded)
            } else {
                padded
            }
        });
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Status     Rows");
        assert_eq!(lines[2], "succeeded  12");
        assert_eq!(lines[3], "\x1b[31mfailed   \x1b[0m  0");
    }

    #[test]
    fn test_csv_has_header() {
        let out = to_csv(&[Row { name: "a, b", hours: 1.5 }]).unwrap();
        assert_eq!(out, "name,hours\n\"a, b\",1.5\n");
    }

    #[test]
    fn test_number() {
        assert_eq!(number(3.0), "3");
        assert_eq!(number(2.5), "2.50");
    }
}
