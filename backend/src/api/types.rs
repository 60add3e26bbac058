//! REST API types for the upload form.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::models::CategoryGroup;
use crate::transform::pipeline::{format_delimiter, CsvInfo, Preview, TransformOutput};

/// Header carrying the job identifier on downloads.
pub const JOB_ID_HEADER: &str = "x-job-id";

/// Preview of a selection, returned by `/api/preview`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResponse {
    pub job_id: String,
    pub status: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub column_count: usize,
    pub row_count: usize,
}

impl PreviewResponse {
    pub fn new(job_id: String, preview: Preview) -> Self {
        Self {
            job_id,
            status: "ready".to_string(),
            columns: preview.columns,
            rows: preview.rows,
            column_count: preview.column_count,
            row_count: preview.row_count,
        }
    }
}

/// Input file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub column_count: usize,
}

impl From<&CsvInfo> for CsvMetadata {
    fn from(info: &CsvInfo) -> Self {
        Self {
            encoding: info.encoding.clone(),
            delimiter: format_delimiter(info.delimiter),
            row_count: info.row_count,
            column_count: info.headers.len(),
        }
    }
}

/// Summary of a finished download, printed by the server after each upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSummary {
    pub job_id: String,
    pub file_name: String,
    pub size: usize,
    pub columns: Vec<String>,
    pub groups: Vec<GroupSummary>,
    pub input: CsvMetadata,
}

/// One category group in a workbook download.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub category: String,
    pub columns: usize,
    pub average: Option<String>,
}

impl From<&CategoryGroup> for GroupSummary {
    fn from(group: &CategoryGroup) -> Self {
        Self {
            category: group.category.clone(),
            columns: group.columns.len(),
            average: group.average.clone(),
        }
    }
}

impl DownloadSummary {
    pub fn new(job_id: String, output: &TransformOutput) -> Self {
        Self {
            job_id,
            file_name: output.file_name.clone(),
            size: output.bytes.len(),
            columns: output.columns.clone(),
            groups: output.groups.iter().map(GroupSummary::from).collect(),
            input: CsvMetadata::from(&output.csv_info),
        }
    }
}

/// Create an error response
pub fn error_response(job_id: &str, error: &str) -> Value {
    json!({
        "jobId": job_id,
        "status": "error",
        "error": error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let body = error_response("abc", "No columns found for Term2");
        assert_eq!(body["status"], "error");
        assert_eq!(body["jobId"], "abc");
        assert_eq!(body["error"], "No columns found for Term2");
    }

    #[test]
    fn test_preview_response_camel_case() {
        let preview = Preview {
            columns: vec!["First Name".into()],
            rows: vec![vec!["Ana".into()]],
            column_count: 1,
            row_count: 12,
        };
        let json = serde_json::to_value(PreviewResponse::new("id".into(), preview)).unwrap();
        assert_eq!(json["columnCount"], 1);
        assert_eq!(json["rowCount"], 12);
        assert_eq!(json["rows"][0][0], "Ana");
    }

    #[test]
    fn test_csv_metadata_from_info() {
        let info = CsvInfo {
            encoding: "utf-8".into(),
            delimiter: '\t',
            headers: vec!["a".into(), "b".into()],
            row_count: 3,
        };
        let meta = CsvMetadata::from(&info);
        assert_eq!(meta.delimiter, "TAB");
        assert_eq!(meta.column_count, 2);
    }
}
