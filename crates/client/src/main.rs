use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use fdq_client::bench_fixtures::generate_delay_fixture;
use fdq_client::bench_queries::CANONICAL_BENCHMARK_QUERIES;
use fdq_client::{run_benchmark, BenchmarkReport, DataFusionEngine};
use fdq_common::{global_metrics, BenchConfig, Result, TimingScope};
use tracing_subscriber::EnvFilter;

/// Time the flight-delay ratio queries and write the results table.
#[derive(Debug, Parser)]
#[command(name = "fdq-bench", version)]
struct Cli {
    /// Delimited text file with a header row.
    #[arg(long = "data_source", value_name = "PATH")]
    data_source: Option<PathBuf>,

    /// Destination for the results table (`.csv` file or directory).
    #[arg(long = "output_uri", value_name = "URI")]
    output_uri: Option<String>,

    /// TOML file with run settings; flags win over it.
    #[arg(long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// `collect` (default) times full materialization, `plan` only planning.
    #[arg(long = "timing_scope", value_name = "SCOPE")]
    timing_scope: Option<TimingScope>,

    #[arg(long = "target_partitions", value_name = "N")]
    target_partitions: Option<usize>,

    #[arg(long = "batch_size_rows", value_name = "N")]
    batch_size_rows: Option<usize>,

    /// Write the prometheus text exposition here after the run.
    #[arg(long = "metrics_path", value_name = "PATH")]
    metrics_path: Option<PathBuf>,

    /// Write a synthetic dataset into DIR and exit.
    #[arg(long = "generate_fixture", value_name = "DIR")]
    generate_fixture: Option<PathBuf>,

    #[arg(long = "rows_per_year", value_name = "N", default_value_t = 200)]
    rows_per_year: usize,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("fdq-bench: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    if let Some(root) = &cli.generate_fixture {
        let fixture = generate_delay_fixture(root, cli.rows_per_year)?;
        println!(
            "Fixture: {} ({} rows, {}-{})",
            fixture.csv.display(),
            fixture.manifest.rows,
            fixture.manifest.first_year,
            fixture.manifest.last_year
        );
        return Ok(());
    }

    let config = resolve_config(cli)?;
    let engine = DataFusionEngine::new(&config)?;
    let report = run_benchmark(&engine, &config, global_metrics()).await?;
    print_summary(&report, &config);

    if let Some(path) = &cli.metrics_path {
        write_metrics(path)?;
    }
    Ok(())
}

/// defaults <- config file <- FDQ_* env <- flags
fn resolve_config(cli: &Cli) -> Result<BenchConfig> {
    let base = match &cli.config {
        Some(path) => BenchConfig::from_toml_file(path)?,
        None => BenchConfig::default(),
    };
    let mut config = base.with_env_overrides()?;
    if let Some(v) = &cli.data_source {
        config.data_source = Some(v.clone());
    }
    if let Some(v) = &cli.output_uri {
        config.output_uri = Some(v.clone());
    }
    if let Some(v) = cli.timing_scope {
        config.timing_scope = v;
    }
    if let Some(v) = cli.target_partitions {
        config.target_partitions = v;
    }
    if let Some(v) = cli.batch_size_rows {
        config.batch_size_rows = v;
    }
    Ok(config)
}

fn print_summary(report: &BenchmarkReport, config: &BenchConfig) {
    println!(
        "Benchmark: {} queries x {} iterations, timing scope: {}",
        report.table.len(),
        fdq_client::ITERATIONS_PER_QUERY,
        config.timing_scope
    );
    for (record, query) in report.table.records().iter().zip(CANONICAL_BENCHMARK_QUERIES) {
        let timings = record
            .timings_secs()
            .iter()
            .map(|t| format!("{t:.4}"))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "- {} {:<26} {:>8.4} s avg  [{}]",
            record.query_number(),
            query.stable_id(),
            record.mean_secs(),
            timings
        );
    }
    println!("Results: {}", report.output_file.display());
}

fn write_metrics(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, global_metrics().render_prometheus())?;
    Ok(())
}
