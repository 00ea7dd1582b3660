// crates/bagport-core/src/pipeline.rs
//
// Drives the per-table sequence materialize → write → upload → cleanup and
// aggregates the outcomes into a run report.

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use bagport_bucket::ObjectStore;

use crate::error::{ExportError, Result};
use crate::progress::ProgressSink;
use crate::{catalog, materialize, parquet_out};

pub const PARQUET_CONTENT_TYPE: &str = "application/vnd.apache.parquet";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Materializing,
    Writing,
    Uploading,
    CleaningUp,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Materializing => "materializing",
            Stage::Writing => "writing",
            Stage::Uploading => "uploading",
            Stage::CleaningUp => "cleaning-up",
        };
        f.write_str(name)
    }
}

/// What a per-table failure means for the rest of the run. The reference
/// deployment stops at the first failed table; `ContinueOnError` processes
/// the remainder and reports every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTolerance {
    FailFast,
    ContinueOnError,
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub scratch_dir: PathBuf,
    pub key_prefix: String,
    pub fault_tolerance: FaultTolerance,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            key_prefix: "bag/".to_string(),
            fault_tolerance: FaultTolerance::FailFast,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TableOutcome {
    pub table: String,
    pub rows: usize,
    pub remote_key: Option<String>,
    pub failed_stage: Option<Stage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableOutcome {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            rows: 0,
            remote_key: None,
            failed_stage: None,
            error: None,
        }
    }

    fn fail(mut self, stage: Stage, err: &ExportError) -> Self {
        error!(table = %self.table, stage = %stage, error = %err, "table failed");
        self.failed_stage = Some(stage);
        self.error = Some(err.to_string());
        self
    }

    pub fn is_done(&self) -> bool {
        self.failed_stage.is_none()
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<TableOutcome>,
}

impl RunReport {
    /// The run as a whole succeeds only if every enumerated table completed.
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(TableOutcome::is_done)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TableOutcome> {
        self.outcomes.iter().filter(|o| !o.is_done())
    }
}

/// Exports every user table: snapshot, repair column types, serialize to
/// parquet on scratch storage, upload, clean up. Tables are processed
/// strictly sequentially.
///
/// Fatal conditions (unreadable source, failed enumeration) return `Err`;
/// per-table failures land in the report.
pub async fn run(
    pool: &SqlitePool,
    store: &dyn ObjectStore,
    config: &ExportConfig,
    progress: &dyn ProgressSink,
) -> Result<RunReport> {
    let started_at = Utc::now();

    let tables = catalog::list_user_tables(pool).await.map_err(|err| match err {
        ExportError::Sqlx(inner) => ExportError::SourceUnavailable(inner),
        other => other,
    })?;
    info!(count = tables.len(), "enumerated user tables");

    let total = tables.len() as u64;
    let mut outcomes = Vec::with_capacity(tables.len());
    for (index, table) in tables.iter().enumerate() {
        progress.update(index as u64, total, table);

        let outcome = export_table(pool, store, config, table, progress).await;
        let failed = !outcome.is_done();
        outcomes.push(outcome);

        if failed && config.fault_tolerance == FaultTolerance::FailFast {
            warn!(table = %table, "stopping run after first failed table");
            break;
        }
    }
    // Report what actually happened: a fail-fast abort leaves tables
    // unprocessed, so the bar must not claim completion.
    let processed = outcomes.len() as u64;
    let label = if outcomes.iter().all(TableOutcome::is_done) {
        "done"
    } else {
        "failed"
    };
    progress.update(processed, total, label);

    let report = RunReport {
        started_at,
        finished_at: Utc::now(),
        outcomes,
    };
    info!(
        tables = report.outcomes.len(),
        failed = report.failures().count(),
        "export run finished"
    );
    Ok(report)
}

async fn export_table(
    pool: &SqlitePool,
    store: &dyn ObjectStore,
    config: &ExportConfig,
    table: &str,
    progress: &dyn ProgressSink,
) -> TableOutcome {
    let mut outcome = TableOutcome::new(table);

    info!(table, stage = %Stage::Materializing, "processing table");
    let mut conn = match pool.acquire().await {
        Ok(conn) => conn,
        Err(err) => return outcome.fail(Stage::Materializing, &ExportError::from(err)),
    };
    let mut frame = match materialize::materialize(&mut conn, table, progress).await {
        Ok(frame) => frame,
        Err(err) => return outcome.fail(Stage::Materializing, &err),
    };
    drop(conn);

    outcome.rows = frame.height();

    let scratch_path = config.scratch_dir.join(format!("{table}.parquet"));
    info!(table, stage = %Stage::Writing, path = %scratch_path.display(), "writing parquet");
    if let Err(err) = parquet_out::write_dataframe(table, &mut frame, &scratch_path) {
        remove_scratch(&scratch_path);
        return outcome.fail(Stage::Writing, &err);
    }

    let key = format!("{}{}.parquet", config.key_prefix, table);
    info!(table, stage = %Stage::Uploading, key = %key, "uploading parquet");
    let uploaded = upload_file(store, table, &key, &scratch_path).await;

    // The scratch file goes away whether or not the upload worked.
    info!(table, stage = %Stage::CleaningUp, "removing scratch file");
    remove_scratch(&scratch_path);

    match uploaded {
        Ok(()) => {
            info!(table, rows = outcome.rows, key = %key, "table done");
            outcome.remote_key = Some(key);
            outcome
        }
        Err(err) => outcome.fail(Stage::Uploading, &err),
    }
}

async fn upload_file(
    store: &dyn ObjectStore,
    table: &str,
    key: &str,
    path: &Path,
) -> Result<()> {
    let bytes = tokio::fs::read(path).await?;
    store
        .put_object(key, Bytes::from(bytes), PARQUET_CONTENT_TYPE)
        .await
        .map_err(|err| ExportError::UploadFailure {
            table: table.to_string(),
            source: err,
        })
}

fn remove_scratch(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove scratch file");
        }
    }
}
