use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading the location or financial source.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Source unavailable: {path:?}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },
    #[error("Sheet '{sheet}' not found in {path:?} (available: {available})")]
    SheetNotFound { path: PathBuf, sheet: String, available: String },
    #[error("Column '{column}' not found in {path:?}")]
    MissingColumn { path: PathBuf, column: String },
    #[error("Unsupported source format: {path:?}")]
    UnsupportedFormat { path: PathBuf },
    #[error("Failed to parse {path:?}: {reason}")]
    Parse { path: PathBuf, reason: String },
}
