//! Dashboard lookups against the stored tables

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use super::{DashboardSummary, summarize};
use crate::config::repository::datasets::{count_distinct_work_orders, query_records};
use crate::config::repository::refresh_runs::{RunKind, last_successful};
use crate::config::{Config, MachineConfig};

/// Result of asking for one machine's dashboard
#[derive(Debug)]
pub enum SummaryLookup {
    /// No machine or department with that slug
    UnknownMachine,
    /// The machine's dataset has never been loaded
    NotLoaded { table: String },
    /// Loaded, but no rows match the machine
    NoMatches { machine: MachineConfig },
    Found {
        machine: MachineConfig,
        summary: DashboardSummary,
    },
}

pub async fn lookup_summary(
    pool: &SqlitePool,
    config: &Config,
    slug: &str,
    reference: NaiveDate,
) -> Result<SummaryLookup> {
    let Some(machine) = config.machine(slug) else {
        return Ok(SummaryLookup::UnknownMachine);
    };
    let Some(layout) = config.dataset(&machine.dataset) else {
        return Ok(SummaryLookup::UnknownMachine);
    };

    let filter = machine.resource_filter();
    let Some(records) =
        query_records(pool, &layout.table, layout.date_field, filter.as_ref(), None).await?
    else {
        return Ok(SummaryLookup::NotLoaded {
            table: layout.table.clone(),
        });
    };

    let summary = summarize(&records, filter.as_ref(), reference);
    if summary.is_empty() {
        return Ok(SummaryLookup::NoMatches {
            machine: machine.clone(),
        });
    }

    Ok(SummaryLookup::Found {
        machine: machine.clone(),
        summary,
    })
}

/// One tile on the index page
#[derive(Debug, Clone, Serialize)]
pub struct MachineTile {
    pub name: String,
    pub category: String,
    /// Distinct works orders; `None` when the dataset has not been loaded
    pub total_work_orders: Option<i64>,
    pub today: Option<i64>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineOverview {
    pub machines: Vec<MachineTile>,
    pub last_refresh: Option<DateTime<Utc>>,
}

pub async fn machine_overview(
    pool: &SqlitePool,
    config: &Config,
    reference: NaiveDate,
) -> Result<MachineOverview> {
    let mut machines = Vec::with_capacity(config.machines.len());

    for machine in &config.machines {
        let Some(layout) = config.dataset(&machine.dataset) else {
            continue;
        };
        let filter = machine.resource_filter();
        let total =
            count_distinct_work_orders(pool, &layout.table, layout.date_field, filter.as_ref(), None)
                .await?;
        let today = count_distinct_work_orders(
            pool,
            &layout.table,
            layout.date_field,
            filter.as_ref(),
            Some(reference),
        )
        .await?;

        machines.push(MachineTile {
            name: machine.display_name.clone(),
            category: machine.category.clone(),
            total_work_orders: total,
            today,
            url: machine.url(),
        });
    }

    let last_refresh = last_successful(pool, RunKind::Plan)
        .await?
        .and_then(|run| run.finished_at);

    Ok(MachineOverview {
        machines,
        last_refresh,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::repository::datasets::replace_plan_tables;
    use crate::config::repository::memory_pool;
    use crate::etl::{CoercionReport, DateField, LoadedDataset, TypedRecord};

    const CONFIG: &str = r#"
        [source]
        kind = "local"
        root = "."
        file = "plan.xlsx"

        [datasets.vacuum]
        table = "vacuum_data"
        sheet = "Plan"
        header_row = 0
        columns = "A:G"

        [datasets.stores_prep]
        table = "stores_data"
        sheet = "Plan"
        header_row = 0
        columns = "I:O"

        [[machines]]
        slug = "red-cannon"
        display_name = "Red Cannon"
        source_name = "Red Cannon"
        match_mode = "contains"
        dataset = "vacuum"
        category = "Vacuum Forming"

        [[machines]]
        slug = "uno"
        display_name = "UNO"
        source_name = "UNO 810x610"
        dataset = "vacuum"
        category = "Vacuum Forming"

        [[machines]]
        slug = "stores"
        display_name = "Stores"
        dataset = "stores_prep"
        category = "Stores"
    "#;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(resource: &str, wo: &str, on: Option<NaiveDate>) -> TypedRecord {
        TypedRecord {
            date: on,
            works_order_number: Some(wo.to_string()),
            part_number: None,
            total_hours: 1.0,
            parts_qty: 1.0,
            wo_status: None,
            resource_description: Some(resource.to_string()),
            printing_status: None,
        }
    }

    async fn seeded() -> SqlitePool {
        let pool = memory_pool().await;
        let today = date(2024, 3, 5);
        let vacuum = LoadedDataset {
            name: "vacuum".into(),
            table: "vacuum_data".into(),
            date_field: DateField::StartDate,
            records: vec![
                record("Red Cannon 1450x915", "WO-1", Some(today)),
                record("Red Cannon 1450x915", "WO-1", Some(today)),
                record("Red Cannon", "WO-2", Some(date(2024, 3, 1))),
                record("Yellow Cannon", "WO-3", Some(today)),
            ],
            report: CoercionReport::default(),
        };
        replace_plan_tables(&pool, &[vacuum]).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_lookup_outcomes_are_distinct() {
        let pool = seeded().await;
        let config = Config::from_toml(CONFIG).unwrap();
        let today = date(2024, 3, 5);

        let found = lookup_summary(&pool, &config, "Red-Cannon", today).await.unwrap();
        let SummaryLookup::Found { machine, summary } = found else {
            panic!("expected a summary");
        };
        assert_eq!(machine.display_name, "Red Cannon");
        assert_eq!(summary.total_work_orders, 3);
        assert_eq!(summary.total_today, 2);
        assert_eq!(summary.total_backlog, 1);

        assert!(matches!(
            lookup_summary(&pool, &config, "uno", today).await.unwrap(),
            SummaryLookup::NoMatches { .. }
        ));
        assert!(matches!(
            lookup_summary(&pool, &config, "stores", today).await.unwrap(),
            SummaryLookup::NotLoaded { ref table } if table == "stores_data"
        ));
        assert!(matches!(
            lookup_summary(&pool, &config, "laser", today).await.unwrap(),
            SummaryLookup::UnknownMachine
        ));
    }

    #[tokio::test]
    async fn test_overview_counts_distinct_orders() {
        let pool = seeded().await;
        let config = Config::from_toml(CONFIG).unwrap();
        let overview = machine_overview(&pool, &config, date(2024, 3, 5)).await.unwrap();

        assert_eq!(overview.machines.len(), 3);
        let red = &overview.machines[0];
        assert_eq!(red.total_work_orders, Some(2));
        assert_eq!(red.today, Some(1));
        assert_eq!(red.url, "/red-cannon");
        assert_eq!(overview.machines[1].total_work_orders, Some(0));
        assert_eq!(overview.machines[2].total_work_orders, None);
        assert!(overview.last_refresh.is_none());
    }
}
