use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::error::DataFusionError;
use datafusion::prelude::{CsvReadOptions, SessionConfig, SessionContext};
use fdq_common::{BenchConfig, FdqError, Result, TimingScope};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::debug;

use crate::output::{write_csv_single_file, OutputTarget};

/// QueryEngine = the external session the benchmark drives: named CSV views,
/// SQL submission, and a single-file table writer.
pub trait QueryEngine: Send + Sync + Debug {
    /// Register a header-carrying CSV file under `view`.
    fn register_csv<'a>(&'a self, view: &'a str, path: &'a Path) -> BoxFuture<'a, Result<()>>;

    fn view_columns<'a>(&'a self, view: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;

    /// Submit `sql`. Under [`TimingScope::Collect`] the result is fully
    /// materialized and its row count returned; under `Plan` this returns 0.
    fn execute_sql<'a>(&'a self, sql: &'a str, scope: TimingScope) -> BoxFuture<'a, Result<u64>>;

    /// Write `batches` as one header-included CSV file, replacing the target.
    fn write_table<'a>(
        &'a self,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
        target: &'a OutputTarget,
    ) -> BoxFuture<'a, Result<PathBuf>>;

    fn shutdown(&self) -> BoxFuture<'_, Result<()>> {
        async { Ok(()) }.boxed()
    }
}

/// Embedded DataFusion session.
pub struct DataFusionEngine {
    ctx: SessionContext,
    views: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl DataFusionEngine {
    /// Fails with `InvalidConfig` on zero batch size or partitions, which the
    /// session builder would otherwise assert on.
    pub fn new(config: &BenchConfig) -> Result<Self> {
        config.validate_engine_settings()?;
        // Templates spell columns as they appear in the CSV header.
        let session_config = SessionConfig::new()
            .with_batch_size(config.batch_size_rows)
            .with_target_partitions(config.target_partitions)
            .set_bool("datafusion.sql_parser.enable_ident_normalization", false);
        Ok(Self {
            ctx: SessionContext::new_with_config(session_config),
            views: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FdqError::Execution(
                "engine session is already shut down".to_string(),
            ));
        }
        Ok(())
    }
}

impl Debug for DataFusionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataFusionEngine")
            .field("session_id", &self.ctx.session_id())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl QueryEngine for DataFusionEngine {
    fn register_csv<'a>(&'a self, view: &'a str, path: &'a Path) -> BoxFuture<'a, Result<()>> {
        async move {
            self.ensure_open()?;
            if !path.is_file() {
                return Err(FdqError::InvalidConfig(format!(
                    "dataset file does not exist: {}",
                    path.display()
                )));
            }
            let location = path.to_str().ok_or_else(|| {
                FdqError::InvalidConfig(format!(
                    "dataset path is not valid UTF-8: {}",
                    path.display()
                ))
            })?;
            // Listing tables filter by extension, so match whatever the file uses.
            let extension = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
                .unwrap_or_default();
            let options = CsvReadOptions::new()
                .has_header(true)
                .file_extension(&extension);
            self.ctx
                .register_csv(view, location, options)
                .await
                .map_err(engine_err)?;
            self.views
                .lock()
                .map_err(|_| FdqError::Execution("view registry lock poisoned".to_string()))?
                .push(view.to_string());
            debug!(view, path = %path.display(), "registered csv view");
            Ok(())
        }
        .boxed()
    }

    fn view_columns<'a>(&'a self, view: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        async move {
            self.ensure_open()?;
            let df = self.ctx.table(view).await.map_err(engine_err)?;
            Ok(df
                .schema()
                .fields()
                .iter()
                .map(|f| f.name().clone())
                .collect())
        }
        .boxed()
    }

    fn execute_sql<'a>(&'a self, sql: &'a str, scope: TimingScope) -> BoxFuture<'a, Result<u64>> {
        async move {
            self.ensure_open()?;
            let df = self.ctx.sql(sql).await.map_err(engine_err)?;
            match scope {
                TimingScope::Plan => Ok(0),
                TimingScope::Collect => {
                    let batches = df.collect().await.map_err(engine_err)?;
                    Ok(batches.iter().map(|b| b.num_rows() as u64).sum())
                }
            }
        }
        .boxed()
    }

    fn write_table<'a>(
        &'a self,
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
        target: &'a OutputTarget,
    ) -> BoxFuture<'a, Result<PathBuf>> {
        async move {
            self.ensure_open()?;
            write_csv_single_file(target, schema, &batches)
        }
        .boxed()
    }

    fn shutdown(&self) -> BoxFuture<'_, Result<()>> {
        async move {
            if self.closed.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            let views = std::mem::take(
                &mut *self
                    .views
                    .lock()
                    .map_err(|_| FdqError::Execution("view registry lock poisoned".to_string()))?,
            );
            for view in views {
                self.ctx.deregister_table(view.as_str()).map_err(engine_err)?;
            }
            debug!(session_id = %self.ctx.session_id(), "engine session shut down");
            Ok(())
        }
        .boxed()
    }
}

fn engine_err(e: DataFusionError) -> FdqError {
    FdqError::Engine(e.to_string())
}
