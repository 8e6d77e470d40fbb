//! Repository for plan dataset tables
//!
//! Tables are replaced wholesale: rows go into `<table>__staging`, then the
//! old table is dropped and the staging table renamed, all in one
//! transaction. Readers see either the previous complete table or the new
//! one, never a half-written one.

use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use super::quoted;
use crate::dashboard::ResourceMatch;
use crate::etl::{DateField, LoadedDataset, TypedRecord};

pub(crate) fn staging_name(table: &str) -> String {
    format!("{}__staging", table)
}

/// Check whether a table has ever been loaded
pub async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table)
            .fetch_optional(pool)
            .await
            .context("Failed to check table existence")?;

    Ok(row.is_some())
}

/// Drop `table` and move its staging table into place
pub(crate) async fn swap_in_staging(tx: &mut Transaction<'_, Sqlite>, table: &str) -> Result<()> {
    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quoted(table)))
        .execute(&mut **tx)
        .await
        .with_context(|| format!("Failed to drop table {}", table))?;

    sqlx::query(&format!(
        "ALTER TABLE {} RENAME TO {}",
        quoted(&staging_name(table)),
        quoted(table)
    ))
    .execute(&mut **tx)
    .await
    .with_context(|| format!("Failed to swap staging table into {}", table))?;

    Ok(())
}

async fn write_staging(tx: &mut Transaction<'_, Sqlite>, dataset: &LoadedDataset) -> Result<()> {
    let staging = quoted(&staging_name(&dataset.table));
    let date_col = dataset.date_field.column();

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", staging))
        .execute(&mut **tx)
        .await
        .context("Failed to clear staging table")?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE {staging} (
            row_index INTEGER NOT NULL,
            {date_col} TEXT,
            works_order_number TEXT,
            part_number TEXT,
            total_hours REAL NOT NULL DEFAULT 0,
            parts_qty REAL NOT NULL DEFAULT 0,
            wo_status TEXT,
            resource_description TEXT,
            printing_status TEXT
        )
        "#
    ))
    .execute(&mut **tx)
    .await
    .with_context(|| format!("Failed to create staging table for {}", dataset.table))?;

    let insert = format!(
        r#"
        INSERT INTO {staging} (
            row_index, {date_col}, works_order_number, part_number, total_hours,
            parts_qty, wo_status, resource_description, printing_status
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    );

    for (idx, record) in dataset.records.iter().enumerate() {
        sqlx::query(&insert)
            .bind(idx as i64)
            .bind(record.date)
            .bind(&record.works_order_number)
            .bind(&record.part_number)
            .bind(record.total_hours)
            .bind(record.parts_qty)
            .bind(&record.wo_status)
            .bind(&record.resource_description)
            .bind(&record.printing_status)
            .execute(&mut **tx)
            .await
            .with_context(|| format!("Failed to insert row {} into {}", idx, dataset.table))?;
    }

    Ok(())
}

/// Replace every plan table in one transaction
///
/// Either all tables move to the new snapshot or none do.
pub async fn replace_plan_tables(pool: &SqlitePool, datasets: &[LoadedDataset]) -> Result<()> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    for dataset in datasets {
        write_staging(&mut tx, dataset).await?;
    }
    for dataset in datasets {
        swap_in_staging(&mut tx, &dataset.table).await?;
    }

    tx.commit().await.context("Failed to commit transaction")?;
    Ok(())
}

fn date_predicate(date_col: &str, on_date: Option<NaiveDate>) -> (String, Option<String>) {
    match on_date {
        Some(date) => (
            format!("WHERE {} = ?", date_col),
            Some(date.format("%Y-%m-%d").to_string()),
        ),
        None => (String::new(), None),
    }
}

fn record_from_row(row: &SqliteRow) -> Result<TypedRecord> {
    Ok(TypedRecord {
        date: row.try_get("record_date")?,
        works_order_number: row.try_get("works_order_number")?,
        part_number: row.try_get("part_number")?,
        total_hours: row.try_get("total_hours")?,
        parts_qty: row.try_get("parts_qty")?,
        wo_status: row.try_get("wo_status")?,
        resource_description: row.try_get("resource_description")?,
        printing_status: row.try_get("printing_status")?,
    })
}

/// Records of a plan table in sheet order, optionally filtered by resource
/// and by date
///
/// The date narrows rows in SQL. The resource match runs in Rust through
/// [`ResourceMatch::matches`], since SQLite's TRIM and LOWER only handle
/// ASCII spaces and letters.
///
/// Returns `None` when the table has never been loaded.
pub async fn query_records(
    pool: &SqlitePool,
    table: &str,
    date_field: DateField,
    filter: Option<&ResourceMatch>,
    on_date: Option<NaiveDate>,
) -> Result<Option<Vec<TypedRecord>>> {
    if !table_exists(pool, table).await? {
        return Ok(None);
    }

    let date_col = date_field.column();
    let (where_clause, bind) = date_predicate(date_col, on_date);
    let sql = format!(
        r#"
        SELECT {date_col} AS record_date, works_order_number, part_number, total_hours,
               parts_qty, wo_status, resource_description, printing_status
        FROM {table}
        {where_clause}
        ORDER BY row_index
        "#,
        table = quoted(table),
    );

    let mut query = sqlx::query(&sql);
    if let Some(value) = &bind {
        query = query.bind(value);
    }
    let rows = query
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to query {}", table))?;

    let mut records = Vec::with_capacity(rows.len());
    for row in &rows {
        let record = record_from_row(row)?;
        let keep = filter.is_none_or(|f| {
            record
                .resource_description
                .as_deref()
                .is_some_and(|description| f.matches(description))
        });
        if keep {
            records.push(record);
        }
    }
    Ok(Some(records))
}

/// Number of distinct works orders, filtered like [`query_records`]
///
/// Rows without a works order number are not counted.
pub async fn count_distinct_work_orders(
    pool: &SqlitePool,
    table: &str,
    date_field: DateField,
    filter: Option<&ResourceMatch>,
    on_date: Option<NaiveDate>,
) -> Result<Option<i64>> {
    let Some(records) = query_records(pool, table, date_field, filter, on_date).await? else {
        return Ok(None);
    };

    let distinct: HashSet<&str> = records
        .iter()
        .filter_map(|r| r.works_order_number.as_deref())
        .collect();
    Ok(Some(distinct.len() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::repository::memory_pool;
    use crate::etl::CoercionReport;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(resource: &str, wo: &str, on: Option<NaiveDate>) -> TypedRecord {
        TypedRecord {
            date: on,
            works_order_number: Some(wo.to_string()),
            part_number: Some("P-1".to_string()),
            total_hours: 1.5,
            parts_qty: 3.0,
            wo_status: Some("Open".to_string()),
            resource_description: Some(resource.to_string()),
            printing_status: None,
        }
    }

    fn dataset(table: &str, date_field: DateField, records: Vec<TypedRecord>) -> LoadedDataset {
        LoadedDataset {
            name: table.to_string(),
            table: table.to_string(),
            date_field,
            records,
            report: CoercionReport::default(),
        }
    }

    #[tokio::test]
    async fn test_missing_table_is_not_empty_table() {
        let pool = memory_pool().await;
        assert!(
            query_records(&pool, "vacuum_data", DateField::StartDate, None, None)
                .await
                .unwrap()
                .is_none()
        );

        replace_plan_tables(&pool, &[dataset("vacuum_data", DateField::StartDate, vec![])])
            .await
            .unwrap();
        let records = query_records(&pool, "vacuum_data", DateField::StartDate, None, None)
            .await
            .unwrap();
        assert_eq!(records, Some(vec![]));
    }

    #[tokio::test]
    async fn test_replace_round_trips_records_in_order() {
        let pool = memory_pool().await;
        let input = vec![
            record("Red Cannon", "WO-2", Some(date(2024, 3, 5))),
            record("Grimme 1", "WO-1", None),
        ];
        replace_plan_tables(&pool, &[dataset("vacuum_data", DateField::StartDate, input.clone())])
            .await
            .unwrap();

        let stored = query_records(&pool, "vacuum_data", DateField::StartDate, None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored, input);
    }

    #[tokio::test]
    async fn test_replace_discards_previous_rows() {
        let pool = memory_pool().await;
        let first = vec![record("Red Cannon", "WO-1", None), record("Red Cannon", "WO-2", None)];
        replace_plan_tables(&pool, &[dataset("vacuum_data", DateField::StartDate, first)])
            .await
            .unwrap();
        let second = vec![record("Red Cannon", "WO-3", None)];
        replace_plan_tables(&pool, &[dataset("vacuum_data", DateField::StartDate, second)])
            .await
            .unwrap();

        let stored = query_records(&pool, "vacuum_data", DateField::StartDate, None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].works_order_number.as_deref(), Some("WO-3"));
        assert!(!table_exists(&pool, "vacuum_data__staging").await.unwrap());
    }

    #[tokio::test]
    async fn test_resource_and_date_predicates() {
        let pool = memory_pool().await;
        let today = date(2024, 3, 5);
        let input = vec![
            record("  Red Cannon 1450x915 ", "WO-1", Some(today)),
            record("red cannon", "WO-2", Some(date(2024, 3, 4))),
            record("Yellow Cannon", "WO-3", Some(today)),
            record("Red Cannon", "WO-2", Some(today)),
        ];
        replace_plan_tables(&pool, &[dataset("goods_in", DateField::FinishDate, input)])
            .await
            .unwrap();

        let exact = ResourceMatch::Exact("RED CANNON".to_string());
        let contains = ResourceMatch::Contains("red cannon".to_string());

        let rows = query_records(&pool, "goods_in", DateField::FinishDate, Some(&exact), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rows.len(), 2);

        let rows = query_records(&pool, "goods_in", DateField::FinishDate, Some(&contains), Some(today))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rows.len(), 2);

        let distinct = count_distinct_work_orders(&pool, "goods_in", DateField::FinishDate, Some(&contains), None)
            .await
            .unwrap();
        assert_eq!(distinct, Some(2));
    }

    #[tokio::test]
    async fn test_resource_match_ignores_unicode_whitespace() {
        let pool = memory_pool().await;
        let today = date(2024, 3, 5);
        let input = vec![
            record("Grimme 1\t", "WO-1", Some(today)),
            record("Grimme 1\u{a0}", "WO-2", Some(today)),
            record("Grimme 1\n", "WO-3", Some(date(2024, 3, 4))),
            record("\u{a0}GRIMME 1", "WO-1", Some(today)),
            record("Grimme 10", "WO-4", Some(today)),
        ];
        replace_plan_tables(&pool, &[dataset("vacuum_data", DateField::StartDate, input)])
            .await
            .unwrap();

        let exact = ResourceMatch::Exact("Grimme 1".to_string());
        let rows = query_records(&pool, "vacuum_data", DateField::StartDate, Some(&exact), None)
            .await
            .unwrap()
            .unwrap();
        let orders: Vec<_> = rows.iter().map(|r| r.works_order_number.as_deref().unwrap()).collect();
        assert_eq!(orders, vec!["WO-1", "WO-2", "WO-3", "WO-1"]);

        let total = count_distinct_work_orders(&pool, "vacuum_data", DateField::StartDate, Some(&exact), None)
            .await
            .unwrap();
        assert_eq!(total, Some(3));

        let today_count =
            count_distinct_work_orders(&pool, "vacuum_data", DateField::StartDate, Some(&exact), Some(today))
                .await
                .unwrap();
        assert_eq!(today_count, Some(2));

        let contains = ResourceMatch::Contains("grimme 1\t".to_string());
        let total = count_distinct_work_orders(&pool, "vacuum_data", DateField::StartDate, Some(&contains), None)
            .await
            .unwrap();
        assert_eq!(total, Some(4));
    }
}
