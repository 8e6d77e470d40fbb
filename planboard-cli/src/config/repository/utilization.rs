//! Repository for the machine utilization table

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use super::datasets::{staging_name, swap_in_staging, table_exists};
use super::quoted;
use crate::etl::{LoadedUtilization, UtilizationRecord};

/// Replace the utilization table with freshly aggregated rows
pub async fn replace_utilization(pool: &SqlitePool, loaded: &LoadedUtilization) -> Result<()> {
    let staging = quoted(&staging_name(&loaded.table));
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", staging))
        .execute(&mut *tx)
        .await
        .context("Failed to clear staging table")?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE {staging} (
            booking_week TEXT NOT NULL,
            resource TEXT NOT NULL,
            planned_hours REAL NOT NULL,
            actual_hours REAL NOT NULL,
            utilization_pct REAL NOT NULL,
            PRIMARY KEY (booking_week, resource)
        )
        "#
    ))
    .execute(&mut *tx)
    .await
    .with_context(|| format!("Failed to create staging table for {}", loaded.table))?;

    let insert = format!(
        "INSERT INTO {} (booking_week, resource, planned_hours, actual_hours, utilization_pct) VALUES (?, ?, ?, ?, ?)",
        staging
    );
    for record in &loaded.records {
        sqlx::query(&insert)
            .bind(&record.booking_week)
            .bind(&record.resource)
            .bind(record.planned_hours)
            .bind(record.actual_hours)
            .bind(record.utilization_pct)
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!(
                    "Failed to insert utilization for {} / {}",
                    record.booking_week, record.resource
                )
            })?;
    }

    swap_in_staging(&mut tx, &loaded.table).await?;
    tx.commit().await.context("Failed to commit transaction")?;
    Ok(())
}

/// Utilization rows ordered by week then resource, optionally for one
/// resource (case-insensitive, trimmed)
///
/// Returns `None` when the table has never been loaded.
pub async fn query_utilization(
    pool: &SqlitePool,
    table: &str,
    resource: Option<&str>,
) -> Result<Option<Vec<UtilizationRecord>>> {
    if !table_exists(pool, table).await? {
        return Ok(None);
    }

    let rows = sqlx::query(&format!(
        r#"
        SELECT booking_week, resource, planned_hours, actual_hours, utilization_pct
        FROM {}
        ORDER BY booking_week, resource
        "#,
        quoted(table)
    ))
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to query {}", table))?;

    let wanted = resource.map(|r| r.trim().to_lowercase());
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let record = UtilizationRecord {
            booking_week: row.try_get("booking_week")?,
            resource: row.try_get("resource")?,
            planned_hours: row.try_get("planned_hours")?,
            actual_hours: row.try_get("actual_hours")?,
            utilization_pct: row.try_get("utilization_pct")?,
        };
        if wanted
            .as_deref()
            .is_none_or(|w| record.resource.trim().to_lowercase() == w)
        {
            records.push(record);
        }
    }

    Ok(Some(records))
}
