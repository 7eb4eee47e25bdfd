//! Shared configuration, error types, and metrics for FDQ crates.
//!
//! Architecture role:
//! - defines the benchmark run configuration passed into the runner
//! - provides common [`FdqError`] / [`Result`] contracts
//! - hosts the prometheus registry the runner records into
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`metrics`]

pub mod config;
pub mod error;
pub mod metrics;

pub use config::{BenchConfig, TimingScope, DEFAULT_VIEW_NAME};
pub use error::{FdqError, Result};
pub use metrics::{global_metrics, MetricsRegistry};
