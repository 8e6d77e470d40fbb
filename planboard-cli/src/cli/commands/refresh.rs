//! `refresh`, `watch` and `history` commands

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use colored::*;
use sqlx::SqlitePool;

use super::output;
use crate::cli::exit_codes;
use crate::config::repository::refresh_runs::{RunStatus, recent_runs};
use crate::refresh::{RefreshError, RefreshReport, Refresher};

/// What a single `refresh` invocation should reload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    All,
    PlanOnly,
    UtilizationOnly,
}

impl RefreshScope {
    pub fn from_flags(plan_only: bool, utilization_only: bool) -> Self {
        match (plan_only, utilization_only) {
            (true, _) => RefreshScope::PlanOnly,
            (_, true) => RefreshScope::UtilizationOnly,
            _ => RefreshScope::All,
        }
    }
}

pub async fn handle_refresh_command(refresher: &Refresher, scope: RefreshScope) -> Result<ExitCode> {
    let results = match scope {
        RefreshScope::All => refresher.refresh_all().await,
        RefreshScope::PlanOnly => vec![refresher.refresh_plan().await],
        RefreshScope::UtilizationOnly => match refresher.refresh_utilization().await {
            Ok(Some(report)) => vec![Ok(report)],
            Ok(None) => {
                println!("{}", "No utilization sheet configured".yellow());
                Vec::new()
            }
            Err(e) => vec![Err(e)],
        },
    };

    let mut failed = false;
    for result in results {
        match result {
            Ok(report) => print_report(&report),
            Err(e) => {
                failed = true;
                print_error(&e);
            }
        }
    }

    Ok(if failed {
        ExitCode::from(exit_codes::REFRESH_FAILED)
    } else {
        ExitCode::SUCCESS
    })
}

pub async fn handle_watch_command(refresher: &Refresher, interval: Duration) -> Result<()> {
    refresher.run_periodic(interval).await
}

pub async fn handle_history_command(pool: &SqlitePool, limit: u32) -> Result<()> {
    let runs = recent_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("{}", "No refreshes recorded".yellow());
        return Ok(());
    }

    let rows: Vec<Vec<String>> = runs
        .iter()
        .map(|run| {
            let status = match run.status {
                RunStatus::Succeeded => "succeeded",
                RunStatus::Failed => "failed",
                RunStatus::Running => "running",
            };
            vec![
                run.started_at
                    .with_timezone(&Local)
                    .format("%d-%m-%Y %H:%M:%S")
                    .to_string(),
                run.kind.to_string(),
                status.to_string(),
                run.rows_loaded.to_string(),
                run.degraded_cells.to_string(),
                run.error.clone().unwrap_or_default(),
            ]
        })
        .collect();

    let headers = ["Started", "Kind", "Status", "Rows", "Degraded", "Error"];
    println!("{}", output::styled_table(&headers, &rows, paint_status));
    Ok(())
}

/// Colour the status column of the history table
fn paint_status(row: &[String], col: usize, padded: String) -> String {
    if col != 2 {
        return padded;
    }
    match row[2].as_str() {
        "succeeded" => padded.green().to_string(),
        "failed" => padded.red().to_string(),
        _ => padded.cyan().to_string(),
    }
}

fn print_report(report: &RefreshReport) {
    println!(
        "{} {} refresh in {}ms ({})",
        "✓".green().bold(),
        report.kind,
        report.elapsed_ms,
        report.run_id.to_string().dimmed()
    );
    for table in &report.tables {
        let degraded = table.report.degraded_cells();
        let mut line = format!("  {:<24} {:>6} rows", table.table, table.rows);
        if table.report.rows_dropped > 0 {
            line.push_str(&format!(", {} blank dropped", table.report.rows_dropped));
        }
        if degraded > 0 {
            line.push_str(&format!(", {}", format!("{} degraded cells", degraded).yellow()));
        }
        println!("{}", line);
    }
}

fn print_error(error: &RefreshError) {
    let hint = match error {
        RefreshError::AlreadyRunning => Some("Another refresh is in progress; try again shortly."),
        RefreshError::Timeout { .. } => Some("Increase source.timeout_secs if the workbook is large."),
        _ => None,
    };
    eprintln!("{} {}", "✗ refresh failed:".red().bold(), error);
    if let Some(hint) = hint {
        eprintln!("  {}", hint.dimmed());
    }
    eprintln!("  {}", "Previous tables were left unchanged.".dimmed());
}
