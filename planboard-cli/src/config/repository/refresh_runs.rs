//! Repository for refresh run bookkeeping

use std::fmt;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Plan,
    Utilization,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Plan => "plan",
            RunKind::Utilization => "utilization",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "plan" => Ok(RunKind::Plan),
            "utilization" => Ok(RunKind::Utilization),
            other => bail!("Unknown refresh kind '{}'", other),
        }
    }
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => bail!("Unknown refresh status '{}'", other),
        }
    }
}

/// One recorded refresh attempt
#[derive(Debug, Clone, Serialize)]
pub struct RefreshRun {
    pub id: String,
    pub kind: RunKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub rows_loaded: i64,
    pub degraded_cells: i64,
    pub error: Option<String>,
}

/// How a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Succeeded { rows_loaded: usize, degraded_cells: usize },
    Failed { error: String },
}

/// Record the start of a run
pub async fn start_run(pool: &SqlitePool, id: Uuid, kind: RunKind) -> Result<()> {
    sqlx::query("INSERT INTO refresh_runs (id, kind, started_at, status) VALUES (?, ?, ?, ?)")
        .bind(id.to_string())
        .bind(kind.as_str())
        .bind(Utc::now())
        .bind(RunStatus::Running.as_str())
        .execute(pool)
        .await
        .context("Failed to record refresh start")?;

    Ok(())
}

/// Record how a run ended
pub async fn finish_run(pool: &SqlitePool, id: Uuid, outcome: &RunOutcome) -> Result<()> {
    let (status, rows_loaded, degraded_cells, error) = match outcome {
        RunOutcome::Succeeded {
            rows_loaded,
            degraded_cells,
        } => (RunStatus::Succeeded, *rows_loaded as i64, *degraded_cells as i64, None),
        RunOutcome::Failed { error } => (RunStatus::Failed, 0, 0, Some(error.as_str())),
    };

    sqlx::query(
        r#"
        UPDATE refresh_runs
        SET finished_at = ?, status = ?, rows_loaded = ?, degraded_cells = ?, error = ?
        WHERE id = ?
        "#,
    )
    .bind(Utc::now())
    .bind(status.as_str())
    .bind(rows_loaded)
    .bind(degraded_cells)
    .bind(error)
    .bind(id.to_string())
    .execute(pool)
    .await
    .context("Failed to record refresh result")?;

    Ok(())
}

fn run_from_row(row: &SqliteRow) -> Result<RefreshRun> {
    Ok(RefreshRun {
        id: row.try_get("id")?,
        kind: RunKind::parse(&row.try_get::<String, _>("kind")?)?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        status: RunStatus::parse(&row.try_get::<String, _>("status")?)?,
        rows_loaded: row.try_get("rows_loaded")?,
        degraded_cells: row.try_get("degraded_cells")?,
        error: row.try_get("error")?,
    })
}

/// Most recent successful run of a kind
pub async fn last_successful(pool: &SqlitePool, kind: RunKind) -> Result<Option<RefreshRun>> {
    let row = sqlx::query(
        r#"
        SELECT id, kind, started_at, finished_at, status, rows_loaded, degraded_cells, error
        FROM refresh_runs
        WHERE kind = ? AND status = ?
        ORDER BY finished_at DESC
        LIMIT 1
        "#,
    )
    .bind(kind.as_str())
    .bind(RunStatus::Succeeded.as_str())
    .fetch_optional(pool)
    .await
    .context("Failed to get last refresh")?;

    row.as_ref().map(run_from_row).transpose()
}

/// Latest runs, newest first
pub async fn recent_runs(pool: &SqlitePool, limit: u32) -> Result<Vec<RefreshRun>> {
    let rows = sqlx::query(
        r#"
        SELECT id, kind, started_at, finished_at, status, rows_loaded, degraded_cells, error
        FROM refresh_runs
        ORDER BY started_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .context("Failed to list refresh runs")?;

    rows.iter().map(run_from_row).collect()
}
