//! `machines` command: the index of dashboards

use anyhow::Result;
use chrono::{Local, NaiveDate};
use colored::*;
use sqlx::SqlitePool;

use super::output::{self, OutputFormat};
use crate::config::Config;
use crate::dashboard::{MachineOverview, machine_overview};

pub async fn handle_machines_command(
    pool: &SqlitePool,
    config: &Config,
    reference: NaiveDate,
    format: OutputFormat,
) -> Result<()> {
    let overview = machine_overview(pool, config, reference).await?;

    let text = match format {
        OutputFormat::Json => output::to_json(&overview)?,
        OutputFormat::Csv => output::to_csv(&overview.machines)?,
        OutputFormat::Table => render(&overview),
    };
    println!("{}", text);
    Ok(())
}

fn count(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn render(overview: &MachineOverview) -> String {
    let rows: Vec<Vec<String>> = overview
        .machines
        .iter()
        .map(|m| {
            vec![
                m.name.clone(),
                m.category.clone(),
                count(m.total_work_orders),
                count(m.today),
                m.url.clone(),
            ]
        })
        .collect();

    let mut out = output::table(&["Machine", "Category", "WOs", "Today", "URL"], &rows);
    out.push('\n');
    match overview.last_refresh {
        Some(at) => out.push_str(&format!(
            "\nLast refreshed {}",
            at.with_timezone(&Local).format("%d-%m-%Y %H:%M").to_string().cyan()
        )),
        None => out.push_str(&format!("\n{}", "Never refreshed".yellow())),
    }
    out
}
