mod cli;
mod config;
mod dashboard;
mod etl;
mod refresh;
mod source;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use colored::*;

use cli::commands::{machines, refresh as refresh_cmd, summary, utilization};
use cli::{Cli, Commands};
use config::Config;
use refresh::Refresher;

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = Arc::new(Config::load(cli.config.as_deref())?);
    let db_path = config.database_path()?;
    log::debug!("Using database {}", db_path.display());
    let pool = config::repository::connect(&db_path).await?;

    let refresher = || -> Result<Refresher> {
        let source = source::from_config(&config.source)?;
        Ok(Refresher::new(source, pool.clone(), config.clone()))
    };

    match cli.command {
        Commands::Refresh {
            plan_only,
            utilization_only,
        } => {
            let scope = refresh_cmd::RefreshScope::from_flags(plan_only, utilization_only);
            refresh_cmd::handle_refresh_command(&refresher()?, scope).await
        }
        Commands::Watch { interval } => {
            let interval = match interval {
                Some(0) => bail!("--interval must be greater than zero"),
                Some(secs) => Duration::from_secs(secs),
                None => config.refresh.interval(),
            };
            refresh_cmd::handle_watch_command(&refresher()?, interval).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Summary { slug, date, format } => {
            let reference = date.unwrap_or_else(today);
            summary::handle_summary_command(&pool, &config, &slug, reference, format).await
        }
        Commands::Machines { date, format } => {
            let reference = date.unwrap_or_else(today);
            machines::handle_machines_command(&pool, &config, reference, format).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Utilization { resource, format } => {
            utilization::handle_utilization_command(&pool, &config, resource.as_deref(), format).await
        }
        Commands::History { limit } => {
            refresh_cmd::handle_history_command(&pool, limit).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::debug!("{:?}", e);
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
