use thiserror::Error;

/// Canonical FDQ error taxonomy used across crates.
///
/// Classification guidance:
/// - [`FdqError::InvalidConfig`]: missing inputs, bad flags/env/config file values
/// - [`FdqError::Engine`]: anything the query engine rejects or fails on
/// - [`FdqError::Execution`]: harness-side shape violations (timing counts, table layout)
/// - [`FdqError::Unsupported`]: syntactically valid but intentionally unimplemented behavior
/// - [`FdqError::Io`]: raw filesystem failures from std APIs
#[derive(Debug, Error)]
pub enum FdqError {
    /// Invalid or incomplete run configuration.
    ///
    /// Examples:
    /// - `--data_source` omitted (dataset required)
    /// - `--output_uri` omitted
    /// - unparsable `FDQ_*` environment override or TOML key
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failures reported by the external query engine.
    ///
    /// Examples:
    /// - malformed SQL or unknown column
    /// - unreadable/ill-formed CSV input
    /// - arrow encode failures on the write path
    #[error("engine error: {0}")]
    Engine(String),

    /// Harness invariant violations after inputs were accepted.
    #[error("execution error: {0}")]
    Execution(String),

    /// Transparent std IO failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Valid request for a feature not implemented in this version.
    ///
    /// Examples:
    /// - `s3://` or `hdfs://` output locations
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Standard FDQ result alias.
pub type Result<T> = std::result::Result<T, FdqError>;
