//! Command line interface

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::OutputFormat;

/// Exit codes for lookups that completed but found nothing to show
pub mod exit_codes {
    pub const UNKNOWN_MACHINE: u8 = 2;
    pub const NOT_LOADED: u8 = 3;
    pub const NO_MATCHES: u8 = 4;
    pub const REFRESH_FAILED: u8 = 5;
}

#[derive(Parser)]
#[command(name = "planboard")]
#[command(about = "Production planning dashboards from the plan vs actual workbook")]
#[command(version)]
pub struct Cli {
    /// Configuration file (overrides PLANBOARD_CONFIG and the user config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one refresh cycle
    Refresh {
        /// Only reload the plan datasets
        #[arg(long, conflicts_with = "utilization_only")]
        plan_only: bool,

        /// Only reload machine utilization
        #[arg(long)]
        utilization_only: bool,
    },

    /// Refresh periodically until Ctrl-C
    Watch {
        /// Seconds between refreshes (defaults to refresh.interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Dashboard for one machine or department
    #[command(after_help = "\
Examples:
  planboard summary red-cannon
  planboard summary grimme-1 --date 2024-03-05 --format json
  planboard summary goods-in --format csv")]
    Summary {
        /// Machine slug, e.g. red-cannon
        slug: String,

        /// Reference date for today/backlog (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<chrono::NaiveDate>,

        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Machine index with work order counts
    Machines {
        /// Reference date for the today column
        #[arg(long)]
        date: Option<chrono::NaiveDate>,

        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Planned vs actual hours per booking week
    Utilization {
        /// Only rows for this resource
        #[arg(long)]
        resource: Option<String>,

        #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Recent refresh runs
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_summary() {
        let cli = Cli::parse_from([
            "planboard",
            "--config",
            "plan.toml",
            "summary",
            "red-cannon",
            "--date",
            "2024-03-05",
            "-f",
            "json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("plan.toml")));
        let Commands::Summary { slug, date, format } = cli.command else {
            panic!("expected summary");
        };
        assert_eq!(slug, "red-cannon");
        assert_eq!(date, chrono::NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(format, OutputFormat::Json);
    }

    #[test]
    fn test_refresh_flags_conflict() {
        assert!(
            Cli::try_parse_from(["planboard", "refresh", "--plan-only", "--utilization-only"]).is_err()
        );
    }
}
