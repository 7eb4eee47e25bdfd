use std::path::PathBuf;
use std::time::Instant;

use fdq_common::{BenchConfig, FdqError, MetricsRegistry, Result};
use tracing::{debug, info, warn};

use crate::bench_queries::{query_number, CANONICAL_BENCHMARK_QUERIES, REQUIRED_DATASET_COLUMNS};
use crate::engine::QueryEngine;
use crate::output::OutputTarget;
use crate::results::{ResultsTable, TimingRecord, ITERATIONS_PER_QUERY};

/// Outcome of a completed benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub table: ResultsTable,
    pub output_file: PathBuf,
    /// Result rows of each template's last iteration; all zero under plan-only timing.
    pub rows_out: Vec<u64>,
}

/// Register the dataset, time every template [`ITERATIONS_PER_QUERY`] times,
/// and write the results table once.
///
/// The engine is shut down on every exit path. A failure anywhere before the
/// final write leaves the output location untouched.
pub async fn run_benchmark(
    engine: &dyn QueryEngine,
    config: &BenchConfig,
    metrics: &MetricsRegistry,
) -> Result<BenchmarkReport> {
    let outcome = run_queries_and_write(engine, config, metrics).await;
    let shutdown = engine.shutdown().await;
    match (outcome, shutdown) {
        (Ok(report), Ok(())) => Ok(report),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(shutdown_err)) => {
            warn!(error = %shutdown_err, "engine shutdown failed after aborted run");
            Err(e)
        }
    }
}

async fn run_queries_and_write(
    engine: &dyn QueryEngine,
    config: &BenchConfig,
    metrics: &MetricsRegistry,
) -> Result<BenchmarkReport> {
    config.validate()?;
    let data_source = config.require_data_source()?;
    let target = OutputTarget::parse(config.require_output_uri()?)?;
    target.check_overwrite(&[data_source])?;

    engine.register_csv(&config.view_name, data_source).await?;
    let columns = engine.view_columns(&config.view_name).await?;
    let missing = REQUIRED_DATASET_COLUMNS
        .iter()
        .filter(|c| !columns.iter().any(|have| have.as_str() == **c))
        .copied()
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(FdqError::InvalidConfig(format!(
            "dataset {} is missing columns: {}",
            data_source.display(),
            missing.join(", ")
        )));
    }
    info!(
        view = %config.view_name,
        path = %data_source.display(),
        scope = %config.timing_scope,
        "dataset registered"
    );

    let mut table = ResultsTable::new();
    let mut rows_out = Vec::with_capacity(CANONICAL_BENCHMARK_QUERIES.len());
    for (index, query) in CANONICAL_BENCHMARK_QUERIES.iter().copied().enumerate() {
        let query_number = query_number(index);
        let sql = query.sql(&config.view_name);
        let mut timings = Vec::with_capacity(ITERATIONS_PER_QUERY);
        let mut rows = 0_u64;
        for iteration in 1..=ITERATIONS_PER_QUERY {
            let start = Instant::now();
            let outcome = engine.execute_sql(&sql, config.timing_scope).await;
            let elapsed_secs = start.elapsed().as_secs_f64();
            rows = match outcome {
                Ok(rows) => rows,
                Err(e) => {
                    metrics.record_query_failure(query_number);
                    return Err(e);
                }
            };
            metrics.record_query_run(query_number, config.timing_scope.as_str(), elapsed_secs);
            debug!(
                query_number,
                query = query.stable_id(),
                iteration,
                elapsed_secs,
                rows,
                "query iteration finished"
            );
            timings.push(elapsed_secs);
        }

        let record = TimingRecord::new(query_number, timings)?;
        info!(
            query_number,
            query = query.stable_id(),
            mean_secs = record.mean_secs(),
            rows_out = rows,
            "query benchmarked"
        );
        table.push(record);
        rows_out.push(rows);
    }

    let batch = table.to_record_batch()?;
    let output_file = engine
        .write_table(batch.schema(), vec![batch], &target)
        .await?;
    info!(path = %output_file.display(), queries = table.len(), "results written");

    Ok(BenchmarkReport {
        table,
        output_file,
        rows_out,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use datafusion::arrow::datatypes::SchemaRef;
    use datafusion::arrow::record_batch::RecordBatch;
    use fdq_common::TimingScope;
    use futures::future::BoxFuture;
    use futures::FutureExt;

    use super::*;
    use crate::results::RESULTS_COLUMNS;

    /// Records every call; optionally fails the n-th SQL submission.
    #[derive(Debug, Default)]
    struct ScriptedEngine {
        calls: Mutex<Vec<String>>,
        fail_on_execute: Option<usize>,
        columns: Vec<String>,
        written: Mutex<Option<RecordBatch>>,
    }

    impl ScriptedEngine {
        fn with_all_columns() -> Self {
            Self {
                columns: REQUIRED_DATASET_COLUMNS.iter().map(|c| c.to_string()).collect(),
                ..Self::default()
            }
        }

        fn log(&self, call: impl Into<String>) {
            self.calls.lock().expect("calls lock").push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("calls lock").clone()
        }
    }

    impl QueryEngine for ScriptedEngine {
        fn register_csv<'a>(&'a self, view: &'a str, _path: &'a Path) -> BoxFuture<'a, Result<()>> {
            self.log(format!("register:{view}"));
            async { Ok(()) }.boxed()
        }

        fn view_columns<'a>(&'a self, _view: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
            let cols = self.columns.clone();
            async move { Ok(cols) }.boxed()
        }

        fn execute_sql<'a>(
            &'a self,
            sql: &'a str,
            _scope: TimingScope,
        ) -> BoxFuture<'a, Result<u64>> {
            self.log(format!("sql:{sql}"));
            let n = self.calls().iter().filter(|c| c.starts_with("sql:")).count();
            let fail = self.fail_on_execute == Some(n);
            async move {
                if fail {
                    Err(FdqError::Engine("scripted failure".to_string()))
                } else {
                    Ok(22)
                }
            }
            .boxed()
        }

        fn write_table<'a>(
            &'a self,
            _schema: SchemaRef,
            batches: Vec<RecordBatch>,
            target: &'a OutputTarget,
        ) -> BoxFuture<'a, Result<PathBuf>> {
            self.log("write");
            *self.written.lock().expect("written lock") = batches.into_iter().next();
            let path = target.data_file();
            async move { Ok(path) }.boxed()
        }

        fn shutdown(&self) -> BoxFuture<'_, Result<()>> {
            self.log("shutdown");
            async { Ok(()) }.boxed()
        }
    }

    fn config() -> BenchConfig {
        BenchConfig {
            data_source: Some(PathBuf::from("flights.csv")),
            output_uri: Some("out/results".to_string()),
            ..BenchConfig::default()
        }
    }

    #[test]
    fn runs_every_template_five_times_in_declaration_order() {
        let engine = ScriptedEngine::with_all_columns();
        let report = futures::executor::block_on(run_benchmark(
            &engine,
            &config(),
            &MetricsRegistry::new(),
        ))
        .expect("run");

        let numbers = report
            .table
            .records()
            .iter()
            .map(|r| r.query_number())
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert!(report
            .table
            .records()
            .iter()
            .all(|r| r.timings_secs().iter().all(|t| *t >= 0.0)));
        assert_eq!(report.rows_out, vec![22; 5]);
        assert_eq!(report.output_file, PathBuf::from("out/results/part-00000.csv"));

        let calls = engine.calls();
        assert_eq!(calls.first().map(String::as_str), Some("register:delay_flights"));
        assert_eq!(calls.len(), 1 + 25 + 1 + 1);
        let sql = calls
            .iter()
            .filter_map(|c| c.strip_prefix("sql:"))
            .collect::<Vec<_>>();
        for (index, query) in CANONICAL_BENCHMARK_QUERIES.iter().enumerate() {
            let expected = query.sql("delay_flights");
            assert!(sql[index * 5..index * 5 + 5].iter().all(|s| *s == expected));
        }
        assert_eq!(&calls[calls.len() - 2..], ["write", "shutdown"]);

        let written = engine.written.lock().expect("written").clone().expect("batch");
        assert_eq!(written.num_rows(), 5);
        assert_eq!(written.num_columns(), RESULTS_COLUMNS.len());
    }

    #[test]
    fn missing_dataset_fails_fast_but_still_shuts_down() {
        let engine = ScriptedEngine::with_all_columns();
        let cfg = BenchConfig {
            data_source: None,
            ..config()
        };
        let err = futures::executor::block_on(run_benchmark(
            &engine,
            &cfg,
            &MetricsRegistry::new(),
        ))
        .expect_err("dataset required");
        assert!(err.to_string().contains("dataset required"));
        assert_eq!(engine.calls(), vec!["shutdown"]);
    }

    #[test]
    fn failing_query_discards_timings_and_writes_nothing() {
        let engine = ScriptedEngine {
            fail_on_execute: Some(12),
            ..ScriptedEngine::with_all_columns()
        };
        let metrics = MetricsRegistry::new();
        let err = futures::executor::block_on(run_benchmark(&engine, &config(), &metrics))
            .expect_err("scripted failure");
        assert!(matches!(err, FdqError::Engine(_)));

        let calls = engine.calls();
        assert!(!calls.iter().any(|c| c == "write"));
        assert_eq!(calls.last().map(String::as_str), Some("shutdown"));
        assert_eq!(calls.iter().filter(|c| c.starts_with("sql:")).count(), 12);
        assert!(metrics
            .render_prometheus()
            .contains("query_number=\"3\",status=\"failed\""));
    }

    #[test]
    fn output_over_the_dataset_directory_is_refused_up_front() {
        let dir = tempfile::tempdir().expect("tempdir");
        let data = dir.path().join("flights.csv");
        std::fs::write(&data, "Year\n").expect("dataset");
        let engine = ScriptedEngine::with_all_columns();
        let cfg = BenchConfig {
            data_source: Some(data.clone()),
            output_uri: Some(dir.path().display().to_string()),
            ..BenchConfig::default()
        };
        let err = futures::executor::block_on(run_benchmark(
            &engine,
            &cfg,
            &MetricsRegistry::new(),
        ))
        .expect_err("would delete the dataset");
        assert!(matches!(err, FdqError::InvalidConfig(_)));
        assert_eq!(engine.calls(), vec!["shutdown"]);
        assert!(data.exists());
    }

    #[test]
    fn dataset_without_delay_columns_is_rejected() {
        let engine = ScriptedEngine {
            columns: vec!["Year".to_string(), "ArrDelay".to_string()],
            ..ScriptedEngine::default()
        };
        let err = futures::executor::block_on(run_benchmark(
            &engine,
            &config(),
            &MetricsRegistry::new(),
        ))
        .expect_err("missing columns");
        let msg = err.to_string();
        assert!(msg.contains("CarrierDelay"), "{msg}");
        assert!(msg.contains("LateAircraftDelay"), "{msg}");
        assert!(!engine.calls().iter().any(|c| c.starts_with("sql:")));
    }
}
