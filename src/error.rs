//! Error types shared by the pipeline stages.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Unified error type for the pipeline stages.
///
/// Accelerator problems are not represented here. They are recovered inside
/// the stages as CPU-only timings or `available: false` metadata.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// File system errors, with the path that was being touched.
    #[error("I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Result table could not be read or written as CSV.
    #[error("result table error: {0}")]
    Csv(#[from] csv::Error),

    /// Result table parsed but a row violates the table contract.
    #[error("malformed result table {}: line {line}: {reason}", path.display())]
    MalformedResults {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    /// Metadata or check report (de)serialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration validation or parsing errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Input vectors for a size could not be allocated.
    #[error("could not allocate {len} elements for benchmark inputs")]
    Allocation { len: usize },

    /// Chart rendering errors from the plotting backend.
    #[error("chart rendering failed: {0}")]
    Chart(String),

    /// PDF generation errors.
    #[error("PDF generation failed: {0}")]
    Pdf(String),
}

impl PipelineError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
