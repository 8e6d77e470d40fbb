//! `summary` command: the dashboard for one machine or department

use std::process::ExitCode;

use anyhow::Result;
use chrono::NaiveDate;
use colored::*;
use sqlx::SqlitePool;

use super::output::{self, OutputFormat};
use crate::cli::exit_codes;
use crate::config::Config;
use crate::dashboard::{DashboardSummary, SummaryLookup, lookup_summary};

pub async fn handle_summary_command(
    pool: &SqlitePool,
    config: &Config,
    slug: &str,
    reference: NaiveDate,
    format: OutputFormat,
) -> Result<ExitCode> {
    match lookup_summary(pool, config, slug, reference).await? {
        SummaryLookup::UnknownMachine => {
            eprintln!("{} no machine or department called '{}'", "error:".red().bold(), slug);
            eprintln!("Run 'planboard machines' to list them.");
            Ok(ExitCode::from(exit_codes::UNKNOWN_MACHINE))
        }
        SummaryLookup::NotLoaded { table } => {
            eprintln!(
                "{} table '{}' has not been loaded yet; run 'planboard refresh'",
                "error:".red().bold(),
                table
            );
            Ok(ExitCode::from(exit_codes::NOT_LOADED))
        }
        SummaryLookup::NoMatches { machine } => {
            eprintln!(
                "{} no work orders found for {}",
                "warning:".yellow().bold(),
                machine.display_name
            );
            Ok(ExitCode::from(exit_codes::NO_MATCHES))
        }
        SummaryLookup::Found { machine, summary } => {
            let text = match format {
                OutputFormat::Json => output::to_json(&summary)?,
                OutputFormat::Csv => output::to_csv(&summary.work_orders)?,
                OutputFormat::Table => render(&machine.display_name, reference, &summary),
            };
            println!("{}", text);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn render(name: &str, reference: NaiveDate, summary: &DashboardSummary) -> String {
    let mut out = format!(
        "{}  {}\n{} work orders, {} today, {} backlog\n\n",
        name.bright_green().bold(),
        reference.format("%d-%m-%Y").to_string().dimmed(),
        summary.total_work_orders.to_string().bold(),
        summary.total_today.to_string().cyan(),
        summary.total_backlog.to_string().yellow(),
    );

    let rows: Vec<Vec<String>> = summary
        .work_orders
        .iter()
        .map(|wo| {
            vec![
                wo.start_date.clone(),
                wo.work_order_number.clone().unwrap_or_default(),
                wo.part_number.clone().unwrap_or_default(),
                output::number(wo.total_hours_required),
                output::number(wo.parts_qty),
                wo.wo_status.clone().unwrap_or_default(),
                wo.printing_status.clone(),
                if wo.is_backlog { "backlog" } else { "today" }.to_string(),
            ]
        })
        .collect();

    out.push_str(&output::table(
        &["Date", "Works Order", "Part", "Hours", "Qty", "Status", "Printing", ""],
        &rows,
    ));
    out
}
