//! Flight-delay query benchmark.
//!
//! Registers an on-time performance CSV with an embedded query engine, times
//! the five delay-cause ratio queries five times each, and writes one results
//! table.

pub mod bench_fixtures;
pub mod bench_queries;
pub mod engine;
pub mod output;
pub mod results;
pub mod runner;

pub use engine::{DataFusionEngine, QueryEngine};
pub use output::OutputTarget;
pub use results::{ResultsTable, TimingRecord, ITERATIONS_PER_QUERY, RESULTS_COLUMNS};
pub use runner::{run_benchmark, BenchmarkReport};
