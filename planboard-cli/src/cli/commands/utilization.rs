//! `utilization` command

use std::process::ExitCode;

use anyhow::Result;
use colored::*;
use sqlx::SqlitePool;

use super::output::{self, OutputFormat};
use crate::cli::exit_codes;
use crate::config::Config;
use crate::config::repository::utilization::query_utilization;

pub async fn handle_utilization_command(
    pool: &SqlitePool,
    config: &Config,
    resource: Option<&str>,
    format: OutputFormat,
) -> Result<ExitCode> {
    let Some(utilization) = config.utilization.as_ref() else {
        anyhow::bail!("No [utilization] section in the configuration");
    };

    let Some(records) = query_utilization(pool, &utilization.layout.table, resource).await? else {
        eprintln!(
            "{} table '{}' has not been loaded yet; run 'planboard refresh --utilization-only'",
            "error:".red().bold(),
            utilization.layout.table
        );
        return Ok(ExitCode::from(exit_codes::NOT_LOADED));
    };

    let text = match format {
        OutputFormat::Json => output::to_json(&records)?,
        OutputFormat::Csv => output::to_csv(&records)?,
        OutputFormat::Table => {
            let rows: Vec<Vec<String>> = records
                .iter()
                .map(|r| {
                    vec![
                        r.booking_week.clone(),
                        r.resource.clone(),
                        output::number(r.planned_hours),
                        output::number(r.actual_hours),
                        format!("{:.2}%", r.utilization_pct),
                    ]
                })
                .collect();
            output::table(&["Week", "Resource", "Planned", "Actual", "Utilization"], &rows)
        }
    };
    println!("{}", text);
    Ok(ExitCode::SUCCESS)
}
