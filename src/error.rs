//! Error types for gemmsweep operations.
//!
//! Sweeps and aggregations report failures through [`BenchError`] instead of
//! panicking, so a caller can tell a malformed measurement file apart from a
//! benchmark binary that could not be launched.

use std::fmt;
use std::path::{Path, PathBuf};

/// Errors that can occur while sweeping or aggregating benchmark results.
#[derive(Debug, Clone, PartialEq)]
pub enum BenchError {
    /// A measurement record does not have the expected shape.
    SchemaError {
        /// File the record was read from, when known.
        file: Option<PathBuf>,
        /// Name of the offending field.
        field: String,
        /// Human-readable error message.
        message: String,
    },
    /// A value is outside the domain of a derived metric.
    DomainError {
        /// File the record was read from, when known.
        file: Option<PathBuf>,
        /// Index of the offending row within its file.
        row: usize,
        /// Human-readable error message.
        message: String,
    },
    /// The external benchmark executable could not be run to completion.
    ///
    /// A non-zero exit status is not reported here: it is recorded in the
    /// execution outcome and the sweep carries on.
    ExternalProcessError {
        /// Backend the invocation was made for.
        backend: String,
        /// Human-readable error message.
        message: String,
    },
    /// Invalid configuration.
    ValidationError {
        /// Human-readable error message.
        message: String,
    },
    /// Reading or writing a file failed.
    IoError {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Human-readable error message.
        message: String,
    },
    /// The charting collaborator failed to render an image.
    PlotError {
        /// Human-readable error message.
        message: String,
    },
}

fn describe_file(file: &Option<PathBuf>) -> String {
    match file {
        Some(path) => format!(" in {}", path.display()),
        None => String::new(),
    }
}

impl fmt::Display for BenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BenchError::SchemaError {
                file,
                field,
                message,
            } => write!(
                f,
                "Schema error{}: field `{}`: {}",
                describe_file(file),
                field,
                message
            ),
            BenchError::DomainError { file, row, message } => write!(
                f,
                "Domain error{} (row {}): {}",
                describe_file(file),
                row,
                message
            ),
            BenchError::ExternalProcessError { backend, message } => {
                write!(f, "External process error (backend {}): {}", backend, message)
            }
            BenchError::ValidationError { message } => {
                write!(f, "Validation error: {}", message)
            }
            BenchError::IoError { path, message } => {
                write!(f, "I/O error on {}: {}", path.display(), message)
            }
            BenchError::PlotError { message } => write!(f, "Plot error: {}", message),
        }
    }
}

impl std::error::Error for BenchError {}

impl BenchError {
    /// Attaches the file a schema or domain error originated from.
    ///
    /// Other variants are returned unchanged.
    pub fn in_file(self, path: impl AsRef<Path>) -> Self {
        match self {
            BenchError::SchemaError { field, message, .. } => BenchError::SchemaError {
                file: Some(path.as_ref().to_path_buf()),
                field,
                message,
            },
            BenchError::DomainError { row, message, .. } => BenchError::DomainError {
                file: Some(path.as_ref().to_path_buf()),
                row,
                message,
            },
            other => other,
        }
    }
}

/// Result type alias for gemmsweep operations.
pub type Result<T> = std::result::Result<T, BenchError>;

/// Creates a schema error that is not yet tied to a file.
pub fn schema_error(field: impl Into<String>, message: impl Into<String>) -> BenchError {
    BenchError::SchemaError {
        file: None,
        field: field.into(),
        message: message.into(),
    }
}

/// Creates a domain error for the given row.
pub fn domain_error(row: usize, message: impl Into<String>) -> BenchError {
    BenchError::DomainError {
        file: None,
        row,
        message: message.into(),
    }
}

/// Creates an external process error.
pub fn process_error(backend: impl Into<String>, message: impl Into<String>) -> BenchError {
    BenchError::ExternalProcessError {
        backend: backend.into(),
        message: message.into(),
    }
}

/// Creates a validation error.
pub fn validation_error(message: impl Into<String>) -> BenchError {
    BenchError::ValidationError {
        message: message.into(),
    }
}

/// Creates an I/O error from the failing path and the underlying error.
pub fn io_error(path: impl AsRef<Path>, err: std::io::Error) -> BenchError {
    BenchError::IoError {
        path: path.as_ref().to_path_buf(),
        message: err.to_string(),
    }
}

/// Creates a plot error.
pub fn plot_error(message: impl Into<String>) -> BenchError {
    BenchError::PlotError {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display_names_file_and_field() {
        let error = schema_error("dim_strategy", "no recognized variant").in_file("run/a.json");
        let display = format!("{}", error);
        assert!(display.contains("Schema error"));
        assert!(display.contains("run/a.json"));
        assert!(display.contains("`dim_strategy`"));
        assert!(display.contains("no recognized variant"));
    }

    #[test]
    fn test_schema_error_without_file() {
        let display = format!("{}", schema_error("times", "empty sample list"));
        assert_eq!(display, "Schema error: field `times`: empty sample list");
    }

    #[test]
    fn test_domain_error_display() {
        let error = domain_error(3, "times_min is 0").in_file("b.json");
        let display = format!("{}", error);
        assert!(display.contains("Domain error in b.json"));
        assert!(display.contains("row 3"));
    }

    #[test]
    fn test_in_file_leaves_other_variants_alone() {
        let error = validation_error("nc candidates are empty");
        assert_eq!(error.clone().in_file("x.json"), error);
    }

    #[test]
    fn test_io_error_keeps_path() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        match io_error("missing/dir", err) {
            BenchError::IoError { path, message } => {
                assert_eq!(path, PathBuf::from("missing/dir"));
                assert_eq!(message, "gone");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_trait_implementation() {
        let error = process_error("glare", "binary not found");
        let _: &dyn std::error::Error = &error;
        assert!(std::error::Error::source(&error).is_none());
    }
}
