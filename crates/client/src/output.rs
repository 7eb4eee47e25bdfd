use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};

use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::csv::WriterBuilder;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use fdq_common::{FdqError, Result};
use url::Url;

pub const PART_FILE_NAME: &str = "part-00000.csv";
pub const SUCCESS_MARKER: &str = "_SUCCESS";

/// Where the results table lands.
///
/// A `.csv` path is written as that exact file. Anything else is a directory
/// holding a single part file plus a `_SUCCESS` marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    File(PathBuf),
    Directory(PathBuf),
}

impl OutputTarget {
    pub fn parse(uri: &str) -> Result<Self> {
        let trimmed = uri.trim();
        if trimmed.is_empty() {
            return Err(FdqError::InvalidConfig(
                "output location must not be empty".to_string(),
            ));
        }
        let path = if trimmed.contains("://") {
            let url = Url::parse(trimmed).map_err(|e| {
                FdqError::InvalidConfig(format!("invalid output uri '{trimmed}': {e}"))
            })?;
            if url.scheme() != "file" {
                return Err(FdqError::Unsupported(format!(
                    "output scheme '{}' is not supported; use a local path or file:// uri",
                    url.scheme()
                )));
            }
            url.to_file_path().map_err(|_| {
                FdqError::InvalidConfig(format!("output uri '{trimmed}' is not a local file path"))
            })?
        } else {
            PathBuf::from(trimmed)
        };

        let is_csv_file = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        Ok(if is_csv_file {
            Self::File(path)
        } else {
            Self::Directory(path)
        })
    }

    pub fn root(&self) -> &Path {
        match self {
            Self::File(p) | Self::Directory(p) => p,
        }
    }

    /// Path of the one data file this target ends up holding.
    pub fn data_file(&self) -> PathBuf {
        match self {
            Self::File(p) => p.clone(),
            Self::Directory(p) => p.join(PART_FILE_NAME),
        }
    }

    /// Refuse targets whose overwrite would delete something that is not ours:
    /// the filesystem root, the working directory or one of its ancestors, and
    /// any directory holding a `protected` path (the dataset). A `.csv` target
    /// may not be a protected file itself.
    pub fn check_overwrite(&self, protected: &[&Path]) -> Result<()> {
        let root = self.root();
        if root.as_os_str().is_empty() {
            return Err(FdqError::InvalidConfig(
                "output location must not be empty".to_string(),
            ));
        }
        let cwd = resolve(Path::new("."))?;
        let resolved = resolve(root)?;
        if resolved.parent().is_none() {
            return Err(FdqError::InvalidConfig(format!(
                "refusing to overwrite filesystem root {}",
                root.display()
            )));
        }
        if cwd.starts_with(&resolved) {
            return Err(FdqError::InvalidConfig(format!(
                "refusing to overwrite {}: it is or contains the working directory",
                root.display()
            )));
        }
        for path in protected {
            let guarded = resolve(path)?;
            let clobbered = match self {
                Self::File(_) => guarded == resolved,
                Self::Directory(_) => guarded.starts_with(&resolved),
            };
            if clobbered {
                return Err(FdqError::InvalidConfig(format!(
                    "refusing to overwrite {}: it would delete {}",
                    root.display(),
                    path.display()
                )));
            }
        }
        Ok(())
    }

    fn clear_existing(&self) -> Result<()> {
        self.check_overwrite(&[])?;
        let root = self.root();
        if root.is_dir() {
            fs::remove_dir_all(root)?;
        } else if root.exists() {
            fs::remove_file(root)?;
        }
        match self {
            Self::File(p) => {
                if let Some(parent) = p.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
            }
            Self::Directory(p) => fs::create_dir_all(p)?,
        }
        Ok(())
    }
}

/// Absolute, `.`/`..`-free form of `path`, with symlinks resolved when the
/// path exists.
fn resolve(path: &Path) -> Result<PathBuf> {
    if let Ok(canonical) = fs::canonicalize(path) {
        return Ok(canonical);
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut out = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

/// Coalesce `batches` into one CSV file with a header row, replacing
/// whatever was at the target before.
pub fn write_csv_single_file(
    target: &OutputTarget,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> Result<PathBuf> {
    let merged = concat_batches(&schema, batches)
        .map_err(|e| FdqError::Engine(format!("coalesce output batches failed: {e}")))?;

    target.clear_existing()?;
    let data_file = target.data_file();
    let file = File::create(&data_file).map_err(|e| {
        FdqError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to create {}: {e}", data_file.display()),
        ))
    })?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer
        .write(&merged)
        .map_err(|e| FdqError::Engine(format!("csv write failed: {e}")))?;
    drop(writer);

    if let OutputTarget::Directory(dir) = target {
        File::create(dir.join(SUCCESS_MARKER))?;
    }
    Ok(data_file)
}
