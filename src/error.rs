//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = SeqfeatError> = std::result::Result<T, E>;

/// Domain-specific error describing failures while reading examples or building features.
///
/// Every variant is fail-fast: the pipeline never retries and never drops a bad record.
#[derive(Debug, Error)]
pub enum SeqfeatError {
    /// Pipeline or task configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A row, line, or element of a source file could not be interpreted.
    #[error("format error in {path:?}{}: {message}", line_suffix(.line))]
    Format {
        /// File the malformed input came from.
        path: PathBuf,
        /// 1-based line number when it is known.
        line: Option<usize>,
        /// Human readable description of the defect.
        message: String,
    },
    /// A required file or directory is missing.
    #[error("not found: {0:?}")]
    NotFound(PathBuf),
    /// The requested operation is unavailable for the selected example source.
    #[error("{operation} is not supported by the {source_kind} source")]
    NotSupported {
        /// Operation that was attempted.
        operation: &'static str,
        /// Example source variant that rejected the operation.
        source_kind: &'static str,
    },
    /// An example carried a label outside of the declared label set.
    #[error("example {example_id}: label {label:?} is not part of the label set")]
    UnknownLabel {
        /// Identifier of the offending example.
        example_id: String,
        /// Label found on the example (`None` when it had no label at all).
        label: Option<String>,
    },
    /// Assembled feature arrays broke a structural invariant. Indicates a defect, not bad input.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    /// Conversion was aborted because one unit failed inside the worker pool.
    #[error("worker failed on example {example_id}: {source}")]
    WorkerFailure {
        /// Identifier of the example whose conversion failed.
        example_id: String,
        /// Underlying failure.
        source: Box<SeqfeatError>,
    },
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// Tokenizer failed to split text or map tokens to ids.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|l| format!(" at line {l}")).unwrap_or_default()
}

impl From<tokenizers::Error> for SeqfeatError {
    fn from(err: tokenizers::Error) -> Self {
        Self::Tokenizer(err.to_string())
    }
}

impl From<serde_json::Error> for SeqfeatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl SeqfeatError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }

    /// Helper constructor for malformed input located in `path`.
    pub fn format(path: impl Into<PathBuf>, line: Option<usize>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Wraps `self` as the cause of a pool failure on `example_id`.
    pub fn in_worker(self, example_id: impl Into<String>) -> Self {
        Self::WorkerFailure {
            example_id: example_id.into(),
            source: Box::new(self),
        }
    }
}
