use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FdqError, Result};

/// Name the dataset is registered under; every query template reads from it.
pub const DEFAULT_VIEW_NAME: &str = "delay_flights";

/// How much of a query run falls inside the timed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimingScope {
    /// Parse and plan only; no batches are produced.
    Plan,
    /// Plan, execute, and drain every result batch.
    #[default]
    Collect,
}

impl TimingScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::Collect => "collect",
        }
    }
}

impl fmt::Display for TimingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimingScope {
    type Err = FdqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plan" => Ok(Self::Plan),
            "collect" => Ok(Self::Collect),
            other => Err(FdqError::InvalidConfig(format!(
                "unknown timing scope '{other}' (expected 'plan' or 'collect')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub data_source: Option<PathBuf>,
    pub output_uri: Option<String>,
    pub view_name: String,
    pub timing_scope: TimingScope,
    pub batch_size_rows: usize,
    pub target_partitions: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            data_source: None,
            output_uri: None,
            view_name: DEFAULT_VIEW_NAME.to_string(),
            timing_scope: TimingScope::Collect,
            batch_size_rows: 8192,
            target_partitions: std::thread::available_parallelism().map_or(1, usize::from),
        }
    }
}

impl BenchConfig {
    /// Load a TOML config file; keys that are absent keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FdqError::Io(std::io::Error::new(
                e.kind(),
                format!("failed reading config {}: {e}", path.display()),
            ))
        })?;
        toml::from_str(&raw).map_err(|e| {
            FdqError::InvalidConfig(format!("invalid config {}: {e}", path.display()))
        })
    }

    /// Apply `FDQ_*` environment overrides on top of the current values.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        if let Some(v) = lookup("FDQ_TIMING_SCOPE") {
            self.timing_scope = v.parse()?;
        }
        if let Some(v) = lookup("FDQ_TARGET_PARTITIONS") {
            self.target_partitions = parse_positive("FDQ_TARGET_PARTITIONS", &v)?;
        }
        if let Some(v) = lookup("FDQ_BATCH_SIZE_ROWS") {
            self.batch_size_rows = parse_positive("FDQ_BATCH_SIZE_ROWS", &v)?;
        }
        Ok(self)
    }

    /// Dataset path, or the fail-fast "dataset required" error.
    pub fn require_data_source(&self) -> Result<&Path> {
        self.data_source.as_deref().ok_or_else(|| {
            FdqError::InvalidConfig(
                "dataset required: pass --data_source with a header-carrying CSV file"
                    .to_string(),
            )
        })
    }

    pub fn require_output_uri(&self) -> Result<&str> {
        self.output_uri.as_deref().ok_or_else(|| {
            FdqError::InvalidConfig(
                "output location required: pass --output_uri".to_string(),
            )
        })
    }

    /// Checks everything a run needs before any engine work happens.
    pub fn validate(&self) -> Result<()> {
        self.require_data_source()?;
        self.require_output_uri()?;
        if self.view_name.trim().is_empty() {
            return Err(FdqError::InvalidConfig(
                "view_name must not be empty".to_string(),
            ));
        }
        self.validate_engine_settings()
    }

    /// Session sizing checks; the engine refuses to start on zero values.
    pub fn validate_engine_settings(&self) -> Result<()> {
        if self.batch_size_rows == 0 {
            return Err(FdqError::InvalidConfig(
                "batch_size_rows must be >= 1".to_string(),
            ));
        }
        if self.target_partitions == 0 {
            return Err(FdqError::InvalidConfig(
                "target_partitions must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize> {
    let v = raw
        .trim()
        .parse::<usize>()
        .map_err(|e| FdqError::InvalidConfig(format!("invalid {key} '{raw}': {e}")))?;
    if v == 0 {
        return Err(FdqError::InvalidConfig(format!("{key} must be >= 1")));
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn missing_dataset_is_rejected_before_anything_else() {
        let cfg = BenchConfig {
            output_uri: Some("out".to_string()),
            ..BenchConfig::default()
        };
        let err = cfg.validate().expect_err("dataset must be required");
        assert!(matches!(err, FdqError::InvalidConfig(_)));
        assert!(err.to_string().contains("dataset required"));
    }

    #[test]
    fn missing_output_is_rejected() {
        let cfg = BenchConfig {
            data_source: Some(PathBuf::from("flights.csv")),
            ..BenchConfig::default()
        };
        let err = cfg.validate().expect_err("output must be required");
        assert!(err.to_string().contains("output location required"));
    }

    #[test]
    fn zero_engine_sizing_is_rejected_without_inputs() {
        let cfg = BenchConfig {
            target_partitions: 0,
            ..BenchConfig::default()
        };
        let err = cfg.validate_engine_settings().expect_err("zero partitions");
        assert!(err.to_string().contains("target_partitions must be >= 1"));

        let cfg = BenchConfig {
            batch_size_rows: 0,
            ..BenchConfig::default()
        };
        let err = cfg.validate_engine_settings().expect_err("zero batch size");
        assert!(err.to_string().contains("batch_size_rows must be >= 1"));
        BenchConfig::default()
            .validate_engine_settings()
            .expect("defaults are valid");
    }

    #[test]
    fn env_overrides_replace_defaults() {
        let cfg = BenchConfig::default()
            .with_overrides_from(lookup(&[
                ("FDQ_TIMING_SCOPE", "plan"),
                ("FDQ_TARGET_PARTITIONS", "3"),
                ("FDQ_BATCH_SIZE_ROWS", "1024"),
            ]))
            .expect("overrides");
        assert_eq!(cfg.timing_scope, TimingScope::Plan);
        assert_eq!(cfg.target_partitions, 3);
        assert_eq!(cfg.batch_size_rows, 1024);
    }

    #[test]
    fn zero_or_garbage_env_values_fail() {
        let err = BenchConfig::default()
            .with_overrides_from(lookup(&[("FDQ_TARGET_PARTITIONS", "0")]))
            .expect_err("zero partitions");
        assert!(err.to_string().contains("FDQ_TARGET_PARTITIONS"));

        let err = BenchConfig::default()
            .with_overrides_from(lookup(&[("FDQ_TIMING_SCOPE", "forever")]))
            .expect_err("bad scope");
        assert!(err.to_string().contains("forever"));
    }

    #[test]
    fn toml_file_keeps_defaults_for_absent_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fdq.toml");
        std::fs::write(
            &path,
            "data_source = \"/data/flights.csv\"\ntiming_scope = \"plan\"\n",
        )
        .expect("write config");

        let cfg = BenchConfig::from_toml_file(&path).expect("load config");
        assert_eq!(cfg.data_source, Some(PathBuf::from("/data/flights.csv")));
        assert_eq!(cfg.timing_scope, TimingScope::Plan);
        assert_eq!(cfg.view_name, DEFAULT_VIEW_NAME);
        assert_eq!(cfg.batch_size_rows, 8192);
        assert!(cfg.output_uri.is_none());
    }
}
