//! Refresh coordination
//!
//! One refresh at a time: fetch the workbook under a timeout, run every
//! dataset through the ETL pipeline, then swap all tables in a single
//! transaction. Any failure before commit leaves the previous tables as
//! they were.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::Config;
use crate::config::repository::datasets::replace_plan_tables;
use crate::config::repository::refresh_runs::{self, RunKind, RunOutcome};
use crate::config::repository::utilization::replace_utilization;
use crate::etl::{
    CoercionReport, EtlError, LoadedDataset, LoadedUtilization, Workbook, load_plan_datasets,
    load_utilization,
};
use crate::source::{DocumentSource, FetchError};

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("A refresh is already running")]
    AlreadyRunning,

    #[error("Fetching {path} timed out after {}s", .after.as_secs())]
    Timeout { path: String, after: Duration },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Etl(#[from] EtlError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Per-table result of a refresh
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub name: String,
    pub table: String,
    pub rows: usize,
    pub report: CoercionReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub run_id: Uuid,
    pub kind: RunKind,
    pub tables: Vec<TableReport>,
    pub elapsed_ms: u128,
}

impl RefreshReport {
    pub fn rows_loaded(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }

    pub fn totals(&self) -> CoercionReport {
        let mut total = CoercionReport::default();
        for table in &self.tables {
            total.absorb(&table.report);
        }
        total
    }
}

pub struct Refresher {
    source: Arc<dyn DocumentSource>,
    pool: SqlitePool,
    config: Arc<Config>,
    gate: Mutex<()>,
}

impl Refresher {
    pub fn new(source: Arc<dyn DocumentSource>, pool: SqlitePool, config: Arc<Config>) -> Self {
        Self {
            source,
            pool,
            config,
            gate: Mutex::new(()),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<u8>, RefreshError> {
        let after = self.config.source.timeout();
        log::info!("Fetching {} from {}", path, self.source.describe());

        match tokio::time::timeout(after, self.source.fetch(path)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(RefreshError::Timeout {
                path: path.to_string(),
                after,
            }),
        }
    }

    /// Parse off the async runtime; workbooks can be large
    async fn parse<T, F>(bytes: Vec<u8>, load: F) -> Result<T, RefreshError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Workbook) -> Result<T, EtlError> + Send + 'static,
    {
        let task = tokio::task::spawn_blocking(move || {
            let mut workbook = Workbook::from_bytes(bytes)?;
            load(&mut workbook)
        });

        match task.await {
            Ok(result) => Ok(result?),
            Err(e) => Err(RefreshError::Store(anyhow::anyhow!("Workbook parsing task failed: {}", e))),
        }
    }

    async fn plan_cycle(&self) -> Result<Vec<LoadedDataset>, RefreshError> {
        let bytes = self.fetch(&self.config.source.file).await?;
        let layouts = self.config.plan_layouts();
        let loaded = Self::parse(bytes, move |workbook| load_plan_datasets(workbook, &layouts)).await?;

        replace_plan_tables(&self.pool, &loaded).await?;
        Ok(loaded)
    }

    async fn utilization_cycle(&self, file: String) -> Result<LoadedUtilization, RefreshError> {
        let Some(utilization) = self.config.utilization.as_ref() else {
            return Err(RefreshError::Store(anyhow::anyhow!("Utilization is not configured")));
        };
        let bytes = self.fetch(&file).await?;
        let layout = utilization.layout.clone();
        let loaded = Self::parse(bytes, move |workbook| load_utilization(workbook, &layout)).await?;

        replace_utilization(&self.pool, &loaded).await?;
        Ok(loaded)
    }

    /// Reload every plan dataset from one snapshot of the planning workbook
    pub async fn refresh_plan(&self) -> Result<RefreshReport, RefreshError> {
        let _guard = self.gate.try_lock().map_err(|_| RefreshError::AlreadyRunning)?;
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        log::info!("Plan refresh {} started", run_id);
        refresh_runs::start_run(&self.pool, run_id, RunKind::Plan).await?;

        let result = self.plan_cycle().await;
        let report = result.map(|loaded| RefreshReport {
            run_id,
            kind: RunKind::Plan,
            tables: loaded
                .into_iter()
                .map(|d| TableReport {
                    rows: d.records.len(),
                    name: d.name,
                    table: d.table,
                    report: d.report,
                })
                .collect(),
            elapsed_ms: started.elapsed().as_millis(),
        });

        self.finish(run_id, RunKind::Plan, report).await
    }

    /// Reload the utilization table; `Ok(None)` when none is configured
    pub async fn refresh_utilization(&self) -> Result<Option<RefreshReport>, RefreshError> {
        let Some(file) = self.config.utilization_file().map(str::to_string) else {
            log::debug!("No utilization sheet configured, skipping");
            return Ok(None);
        };

        let _guard = self.gate.try_lock().map_err(|_| RefreshError::AlreadyRunning)?;
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        log::info!("Utilization refresh {} started", run_id);
        refresh_runs::start_run(&self.pool, run_id, RunKind::Utilization).await?;

        let result = self.utilization_cycle(file).await;
        let report = result.map(|loaded| RefreshReport {
            run_id,
            kind: RunKind::Utilization,
            tables: vec![TableReport {
                name: "utilization".to_string(),
                rows: loaded.records.len(),
                table: loaded.table,
                report: loaded.report,
            }],
            elapsed_ms: started.elapsed().as_millis(),
        });

        self.finish(run_id, RunKind::Utilization, report).await.map(Some)
    }

    async fn finish(
        &self,
        run_id: Uuid,
        kind: RunKind,
        result: Result<RefreshReport, RefreshError>,
    ) -> Result<RefreshReport, RefreshError> {
        let outcome = match &result {
            Ok(report) => {
                for table in &report.tables {
                    log::info!(
                        "{} refresh {}: {} -> {} rows ({} dropped, {} degraded cells)",
                        kind,
                        run_id,
                        table.name,
                        table.rows,
                        table.report.rows_dropped,
                        table.report.degraded_cells()
                    );
                }
                log::info!("{} refresh {} finished in {}ms", kind, run_id, report.elapsed_ms);
                RunOutcome::Succeeded {
                    rows_loaded: report.rows_loaded(),
                    degraded_cells: report.totals().degraded_cells(),
                }
            }
            Err(e) => {
                log::error!("{} refresh {} failed, keeping previous tables: {}", kind, run_id, e);
                RunOutcome::Failed { error: e.to_string() }
            }
        };

        if let Err(e) = refresh_runs::finish_run(&self.pool, run_id, &outcome).await {
            log::warn!("Could not record outcome of refresh {}: {:#}", run_id, e);
        }

        result
    }

    /// Plan refresh followed by the utilization refresh
    pub async fn refresh_all(&self) -> Vec<Result<RefreshReport, RefreshError>> {
        let mut results = vec![self.refresh_plan().await];
        match self.refresh_utilization().await {
            Ok(Some(report)) => results.push(Ok(report)),
            Ok(None) => {}
            Err(e) => results.push(Err(e)),
        }
        results
    }

    /// One scheduled cycle; returns how many refreshes failed
    ///
    /// Failures that never reached `finish` (a held gate, a failed
    /// `start_run`) are only visible here, so every error is logged.
    async fn scheduled_cycle(&self) -> usize {
        let mut failed = 0;
        for result in self.refresh_all().await {
            if let Err(e) = result {
                log::error!("Scheduled refresh failed: {}", e);
                failed += 1;
            }
        }
        failed
    }

    /// Refresh on a fixed interval until Ctrl-C
    ///
    /// Each cycle is awaited before the next tick is taken, so cycles never
    /// overlap; a slow cycle delays the schedule instead of bunching ticks.
    pub async fn run_periodic(&self, interval: Duration) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!("Refreshing every {}s, press Ctrl-C to stop", interval.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // The next tick retries
                    self.scheduled_cycle().await;
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    log::info!("Stopping periodic refresh");
                    return Ok(());
                }
            }
        }
    }
}
