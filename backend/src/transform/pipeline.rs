//! High-level pipeline API: uploaded gradebook bytes in, downloadable file out.
//!
//! Combines parsing, trimester selection, recoding and export.
//!
//! # Example
//!
//! ```rust,ignore
//! use gradebook::{transform_file, GradebookConfig, OutputKind, SelectionMode, Term, TransformRequest};
//! use std::path::Path;
//!
//! let request = TransformRequest {
//!     term: Term::Term1,
//!     mode: SelectionMode::ExcludePrefix,
//!     output: OutputKind::Csv,
//! };
//! let output = transform_file(Path::new("gradebook.csv"), &request, &GradebookConfig::default())?;
//! std::fs::write(&output.file_name, &output.bytes)?;
//! ```

use serde::Serialize;
use std::path::Path;

use super::recoder::{recode, RecodeOptions};
use super::selector::{select, SelectionMode};
use crate::api::logs::{log_info, log_info_indent, log_success};
use crate::config::GradebookConfig;
use crate::error::PipelineResult;
use crate::export::{export, XLSX_CONTENT_TYPE};
use crate::models::{CategoryGroup, ReportMetadata, Term};
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, write_csv, ParseResult};

/// Content type of CSV output.
pub const CSV_CONTENT_TYPE: &str = "text/csv; charset=utf-8";

/// Number of rows shown by [`preview`] unless asked otherwise.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// What to produce from the selected columns.
#[derive(Debug, Clone)]
pub enum OutputKind {
    /// Same CSV dialect as the input.
    Csv,
    /// Recoded, formatted workbook.
    Workbook {
        metadata: ReportMetadata,
        options: RecodeOptions,
    },
}

/// One upload's transformation settings.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub term: Term,
    pub mode: SelectionMode,
    pub output: OutputKind,
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

impl CsvInfo {
    fn from_parse(parsed: &ParseResult) -> Self {
        Self {
            encoding: parsed.encoding.clone(),
            delimiter: parsed.delimiter,
            headers: parsed.headers.clone(),
            row_count: parsed.table.row_count(),
        }
    }
}

/// A finished download.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: &'static str,
    pub csv_info: CsvInfo,
    /// Column names of the produced table.
    pub columns: Vec<String>,
    /// Category groups, workbook output only.
    pub groups: Vec<CategoryGroup>,
}

/// First rows of a selection, for display before download.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub column_count: usize,
    pub row_count: usize,
}

/// Download name for a request.
pub fn output_file_name(request: &TransformRequest) -> String {
    match (&request.output, request.mode) {
        (OutputKind::Workbook { .. }, _) => format!("gradebook_{}.xlsx", request.term),
        (OutputKind::Csv, SelectionMode::ExcludePrefix) => {
            format!("gradebook_without_{}.csv", request.term)
        }
        (OutputKind::Csv, _) => format!("gradebook_{}.csv", request.term),
    }
}

/// Transform a gradebook file.
pub fn transform_file(
    path: &Path,
    request: &TransformRequest,
    config: &GradebookConfig,
) -> PipelineResult<TransformOutput> {
    let parsed = parse_csv_file_auto(path)?;
    transform_parsed(parsed, request, config)
}

/// Transform uploaded gradebook bytes.
pub fn transform_bytes(
    bytes: &[u8],
    request: &TransformRequest,
    config: &GradebookConfig,
) -> PipelineResult<TransformOutput> {
    let parsed = parse_bytes_auto(bytes)?;
    transform_parsed(parsed, request, config)
}

fn transform_parsed(
    parsed: ParseResult,
    request: &TransformRequest,
    config: &GradebookConfig,
) -> PipelineResult<TransformOutput> {
    log_info("📖 Reading gradebook...");
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!(
        "Detected separator: '{}'",
        format_delimiter(parsed.delimiter)
    ));
    log_success(format!(
        "Read {} rows, {} columns",
        parsed.table.row_count(),
        parsed.table.len()
    ));

    let csv_info = CsvInfo::from_parse(&parsed);
    let delimiter = parsed.delimiter;

    log_info(format!(
        "✂️  Selecting {} columns (mode: {})",
        request.term, request.mode
    ));
    let selected = select(parsed.table, request.term, request.mode, config)?;
    log_success(format!("{} columns kept", selected.len()));

    let file_name = output_file_name(request);

    let output = match &request.output {
        OutputKind::Csv => {
            let columns = column_names(&selected);
            let bytes = write_csv(&selected, delimiter)?;
            TransformOutput {
                bytes,
                file_name,
                content_type: CSV_CONTENT_TYPE,
                csv_info,
                columns,
                groups: Vec::new(),
            }
        }
        OutputKind::Workbook { metadata, options } => {
            log_info("🏷️  Recoding category columns...");
            let recoded = recode(selected, *options, config)?;
            for group in &recoded.groups {
                log_info_indent(
                    format!("{}: {} columns", group.category, group.columns.len()),
                    1,
                );
            }

            log_info("📊 Writing workbook...");
            let bytes = export(&recoded.table, metadata, config)?;
            TransformOutput {
                bytes,
                file_name,
                content_type: XLSX_CONTENT_TYPE,
                csv_info,
                columns: column_names(&recoded.table),
                groups: recoded.groups,
            }
        }
    };

    log_success(format!(
        "{} ready ({} bytes)",
        output.file_name,
        output.bytes.len()
    ));
    Ok(output)
}

/// Select columns and return the first `rows` rows for display.
pub fn preview(
    bytes: &[u8],
    term: Term,
    mode: SelectionMode,
    rows: usize,
    config: &GradebookConfig,
) -> PipelineResult<Preview> {
    let parsed = parse_bytes_auto(bytes)?;
    let selected = select(parsed.table, term, mode, config)?;

    let shown = rows.min(selected.row_count());
    let preview_rows = (0..shown)
        .map(|row| {
            selected
                .row(row)
                .iter()
                .map(|cell| cell.to_string())
                .collect()
        })
        .collect();

    Ok(Preview {
        columns: column_names(&selected),
        rows: preview_rows,
        column_count: selected.len(),
        row_count: selected.row_count(),
    })
}

fn column_names(table: &crate::models::Table) -> Vec<String> {
    table.column_names().into_iter().map(String::from).collect()
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, SelectError};
    use chrono::NaiveDate;

    const GRADEBOOK: &str = "\
First Name,Last Name,Unique User ID,Overall,2025,Term1 - 2025,Term1 - 2025 - AUTO EVAL - Category Score,AV01 Reading (Contar en la calificación),TB01 Essay,Term2 - 2025,Term2 - 2025 - AUTO EVAL - Category Score,AV02 Poems
Ana,Ruiz,1001,90,90,88,9,9,8,92,10,10
Luis,Soto,1002,75,75,70,6,x,7,80,8,8
";

    fn csv_request(term: Term, mode: SelectionMode) -> TransformRequest {
        TransformRequest {
            term,
            mode,
            output: OutputKind::Csv,
        }
    }

    #[test]
    fn test_exclude_prefix_to_csv() {
        let config = GradebookConfig::default();
        let request = csv_request(Term::Term2, SelectionMode::ExcludePrefix);

        let out = transform_bytes(GRADEBOOK.as_bytes(), &request, &config).unwrap();

        assert_eq!(out.file_name, "gradebook_without_Term2.csv");
        assert_eq!(out.content_type, CSV_CONTENT_TYPE);
        assert!(!out
            .columns
            .contains(&"Term2 - 2025 - AUTO EVAL - Category Score".to_string()));
        assert!(out.columns.contains(&"Term2 - 2025".to_string()));

        let text = String::from_utf8(out.bytes).unwrap();
        assert!(text.starts_with("First Name,Last Name,Unique User ID,Overall,2025,"));
        assert!(text.contains("Ana,Ruiz,1001,90,90,88,9,9,8,92,10\n"));
    }

    #[test]
    fn test_coded_range_to_workbook() {
        let config = GradebookConfig::default();
        let request = TransformRequest {
            term: Term::Term1,
            mode: SelectionMode::CodedRange,
            output: OutputKind::Workbook {
                metadata: ReportMetadata::new("Ms. Ruiz", "Lengua", "5A", "Primaria")
                    .with_date(NaiveDate::from_ymd_opt(2025, 10, 1).unwrap()),
                options: RecodeOptions {
                    averages: true,
                    spacers: false,
                },
            },
        };

        let out = transform_bytes(GRADEBOOK.as_bytes(), &request, &config).unwrap();

        assert_eq!(out.file_name, "gradebook_Term1.xlsx");
        assert_eq!(out.content_type, XLSX_CONTENT_TYPE);
        assert_eq!(&out.bytes[..2], b"PK");
        assert_eq!(
            out.columns,
            vec![
                "First Name",
                "Last Name",
                "Reading AUTO EVAL",
                "PROMEDIO AUTO EVAL",
                "Essay TRABAJO",
                "PROMEDIO TRABAJO",
            ]
        );
        assert_eq!(out.groups.len(), 2);
    }

    #[test]
    fn test_missing_marker_aborts() {
        let config = GradebookConfig::default();
        let request = csv_request(Term::Term3, SelectionMode::RangeKeep);

        let err = transform_bytes(GRADEBOOK.as_bytes(), &request, &config).unwrap_err();
        assert!(err.is_user_facing());
        assert!(matches!(
            err,
            PipelineError::Select(SelectError::MissingMarker {
                term: Term::Term3,
                ..
            })
        ));
    }

    #[test]
    fn test_repeated_anchor_marker_fails_at_parse() {
        let config = GradebookConfig::default();
        let marker = config.anchor_marker(Term::Term1);
        let input = format!("First Name,{m},{m}\nAna,9,8\n", m = marker);
        let request = csv_request(Term::Term1, SelectionMode::CodedRange);

        let err = transform_bytes(input.as_bytes(), &request, &config).unwrap_err();
        assert!(matches!(err, PipelineError::Csv(_)));
        assert!(err.to_string().contains("Duplicate column"));
    }

    #[test]
    fn test_garbage_input_is_not_user_facing() {
        let config = GradebookConfig::default();
        let request = csv_request(Term::Term1, SelectionMode::ExcludePrefix);

        let err = transform_bytes(b"", &request, &config).unwrap_err();
        assert!(!err.is_user_facing());
    }

    #[test]
    fn test_preview_limits_rows() {
        let config = GradebookConfig::default();
        let preview = preview(
            GRADEBOOK.as_bytes(),
            Term::Term1,
            SelectionMode::ExcludePrefix,
            1,
            &config,
        )
        .unwrap();

        assert_eq!(preview.rows.len(), 1);
        assert_eq!(preview.row_count, 2);
        assert_eq!(preview.column_count, preview.columns.len());
        assert_eq!(preview.rows[0][0], "Ana");
    }

    #[test]
    fn test_output_file_names() {
        assert_eq!(
            output_file_name(&csv_request(Term::Term3, SelectionMode::RangeKeep)),
            "gradebook_Term3.csv"
        );
        assert_eq!(
            output_file_name(&csv_request(Term::Term1, SelectionMode::ExcludePrefix)),
            "gradebook_without_Term1.csv"
        );
    }
}
