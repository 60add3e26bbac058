//! # Gradebook - trimester filtering and workbook export
//!
//! Takes a Schoology gradebook CSV, keeps or drops one trimester's grade
//! columns, and hands back either a CSV in the same dialect or a formatted
//! Excel workbook with category-grouped, renamed columns.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV upload │────▶│   Parser    │────▶│  Selector   │────▶│  CSV out    │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │ (trimester) │──┐  └─────────────┘
//! └─────────────┘     └─────────────┘     └─────────────┘  │  ┌─────────────┐
//!                                                          └─▶│ Recoder +   │
//!                                                             │ xlsx export │
//!                                                             └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gradebook::{transform_bytes, GradebookConfig, OutputKind, SelectionMode, Term, TransformRequest};
//!
//! let request = TransformRequest {
//!     term: Term::Term2,
//!     mode: SelectionMode::ExcludePrefix,
//!     output: OutputKind::Csv,
//! };
//! let output = transform_bytes(&bytes, &request, &GradebookConfig::default())?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Lookup tables (allowlist, category codes) as data
//! - [`models`] - Table, columns, cells, terms
//! - [`parser`] - CSV parsing with auto-detection
//! - [`transform`] - Selector, recoder and pipeline
//! - [`export`] - Excel workbook writer
//! - [`api`] - HTTP form server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Output
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{
    ConfigError, CsvError, ExportError, PipelineError, RecodeError, SelectError, ServerError,
    TableError,
};

// =============================================================================
// Re-exports - Config & Models
// =============================================================================

pub use config::{BoundaryPolicy, CategoryCode, GradebookConfig};
pub use models::{CategoryGroup, Cell, Column, ColumnTag, ReportMetadata, Table, Term};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv_file_auto,
    parse_table, write_csv, ParseResult,
};

// =============================================================================
// Re-exports - Transforms
// =============================================================================

pub use transform::recoder::{parse_code, recode, recoded_name, row_average, RecodeOptions, Recoded};
pub use transform::selector::{detect_terms, select, term_range, SelectionMode};
pub use transform::pipeline::{
    output_file_name, preview, transform_bytes, transform_file, CsvInfo, OutputKind, Preview,
    TransformOutput, TransformRequest,
};

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::export;

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
