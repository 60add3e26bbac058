//! Error types for the gradebook transformation pipeline.
//!
//! - [`CsvError`] - CSV decoding and parsing errors
//! - [`TableError`] - Broken table invariants (ragged or duplicate columns)
//! - [`SelectError`] - Trimester marker lookup failures
//! - [`RecodeError`] - Category recoding failures
//! - [`ExportError`] - Workbook writing errors
//! - [`ConfigError`] - Configuration loading and validation errors
//! - [`PipelineError`] - Top-level orchestration errors
//! - [`ServerError`] - HTTP boundary errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::models::Term;

/// Message shown for every failure that is not a marker problem.
pub const GENERIC_USER_MESSAGE: &str =
    "Please ensure the uploaded file is a valid Schoology gradebook.";

// =============================================================================
// CSV Parsing Errors
// =============================================================================

/// Errors during CSV parsing.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid CSV record.
    #[error("Line {line}: {message}")]
    ParseError { line: u64, message: String },

    /// Failed to write CSV output.
    #[error("Failed to write CSV: {0}")]
    WriteError(String),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No headers found.
    #[error("No headers found in CSV")]
    NoHeaders,
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        CsvError::ParseError {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Table Invariant Errors
// =============================================================================

/// A table invariant was broken while building or reshaping it.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    /// Two non-spacer columns share a name.
    #[error("Duplicate column name: '{0}'")]
    DuplicateColumn(String),

    /// A column does not have the table's row count.
    #[error("Column '{name}' has {actual} cells, expected {expected}")]
    RaggedColumn {
        name: String,
        expected: usize,
        actual: usize,
    },
}

// =============================================================================
// Selection Errors
// =============================================================================

/// Errors while locating trimester markers.
#[derive(Debug, Error, PartialEq)]
pub enum SelectError {
    /// The requested trimester has no marker column.
    #[error("No columns found for {term} (looked for '{marker}')")]
    MissingMarker { term: Term, marker: String },

    /// A later trimester has no marker, so the range end is unknown.
    #[error("Cannot find where {term} ends: no '{marker}' column for {next}")]
    MissingBoundary {
        term: Term,
        next: Term,
        marker: String,
    },

    /// A later trimester starts before the requested one.
    #[error("Columns for {next} come before columns for {term}")]
    MarkersOutOfOrder { term: Term, next: Term },
}

// =============================================================================
// Recoding Errors
// =============================================================================

/// Errors while recoding category columns.
#[derive(Debug, Error)]
pub enum RecodeError {
    /// Two columns carry the same category code.
    #[error("Category code {code} appears on more than one column")]
    DuplicateCode { code: String },

    /// Rebuilding the table broke an invariant.
    #[error(transparent)]
    Table(#[from] TableError),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing the workbook.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The xlsx writer rejected an operation.
    #[error("Workbook error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// The table does not fit in a worksheet.
    #[error("Table too large for a worksheet: {0}")]
    TooLarge(String),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading or validating [`crate::config::GradebookConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error.
    #[error("Config IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Config JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Semantically invalid configuration.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::transform_bytes`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// CSV parsing error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Table invariant error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Selection error.
    #[error("{0}")]
    Select(#[from] SelectError),

    /// Recoding error.
    #[error("Recode error: {0}")]
    Recode(#[from] RecodeError),

    /// Workbook export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Marker problems are reported to the user as-is.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, PipelineError::Select(_))
    }

    /// Text for the person who uploaded the file.
    pub fn user_message(&self) -> String {
        if self.is_user_facing() {
            self.to_string()
        } else {
            format!("An error occurred: {}. {}", self, GENERIC_USER_MESSAGE)
        }
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// A worker task panicked or was cancelled.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for CSV operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for selection operations.
pub type SelectResult<T> = Result<T, SelectError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
