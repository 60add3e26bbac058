//! HTTP server for the gradebook form.
//!
//! Serves the single-page upload form and turns each upload into a download.
//!
//! # API Endpoints
//!
//! | Method | Path            | Description                              |
//! |--------|-----------------|------------------------------------------|
//! | GET    | `/`             | Upload form                              |
//! | GET    | `/health`       | Health check                             |
//! | POST   | `/api/filter`   | Upload CSV, download filtered CSV        |
//! | POST   | `/api/export`   | Upload CSV, download formatted workbook  |
//! | POST   | `/api/preview`  | Upload CSV, get first rows as JSON       |
//! | GET    | `/api/logs`     | SSE stream for real-time logs            |

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, Method, StatusCode},
    response::{sse::Event, Html, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use super::logs::{log_error, with_job, LOG_BROADCASTER};
use super::types::{error_response, DownloadSummary, PreviewResponse, JOB_ID_HEADER};
use crate::config::GradebookConfig;
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::models::{ReportMetadata, Term};
use crate::transform::pipeline::{
    preview, transform_bytes, OutputKind, TransformOutput, TransformRequest, DEFAULT_PREVIEW_ROWS,
};
use crate::transform::recoder::RecodeOptions;
use crate::transform::selector::SelectionMode;

/// Maximum upload size (in bytes).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

const INDEX_HTML: &str = include_str!("../../static/index.html");

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
struct AppState {
    config: Arc<GradebookConfig>,
}

/// Build the router. Split out so tests can drive it without a socket.
pub fn router(config: GradebookConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_DISPOSITION, HeaderName::from_static(JOB_ID_HEADER)]);

    let state = AppState {
        config: Arc::new(config),
    };

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/filter", post(filter_csv))
        .route("/api/export", post(export_workbook))
        .route("/api/preview", post(preview_csv))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(
    port: u16,
    config: GradebookConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    println!("🚀 Gradebook server running on http://localhost:{}", port);
    println!("   GET  /             - Upload form");
    println!("   POST /api/filter   - Filtered CSV download");
    println!("   POST /api/export   - Workbook download");
    println!("   POST /api/preview  - Selection preview");
    println!("   GET  /api/logs     - SSE log stream");
    println!("   GET  /health       - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "gradebook",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "filter": "POST /api/filter",
            "export": "POST /api/export",
            "preview": "POST /api/preview",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Uploaded file plus the text fields of the form.
#[derive(Debug, Default)]
struct UploadForm {
    file_name: Option<String>,
    file: Option<Vec<u8>>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> ServerResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "file" {
                form.file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                form.file = Some(bytes.to_vec());
            } else {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    /// Client-chosen job id, so the form can pick its own entries off the
    /// log stream. Anything that is not a uuid gets a fresh one.
    fn job_id(&self) -> String {
        Uuid::parse_str(&self.text("job_id"))
            .unwrap_or_else(|_| Uuid::new_v4())
            .to_string()
    }

    fn text(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|s| s.trim().to_string())
            .unwrap_or_default()
    }

    fn flag(&self, name: &str) -> bool {
        matches!(self.text(name).as_str(), "on" | "true" | "1" | "yes")
    }

    fn term(&self) -> ServerResult<Term> {
        self.text("term").parse().map_err(ServerError::BadRequest)
    }

    fn mode(&self, default: SelectionMode) -> ServerResult<SelectionMode> {
        match self.fields.get("mode") {
            Some(mode) if !mode.trim().is_empty() => mode.parse().map_err(ServerError::BadRequest),
            _ => Ok(default),
        }
    }

    fn take_file(&mut self) -> ServerResult<Vec<u8>> {
        self.file
            .take()
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| ServerError::BadRequest("No file provided".to_string()))
    }
}

/// Map an error to a status and JSON body.
fn api_error(job_id: &str, err: ServerError) -> ApiError {
    let (status, message) = match &err {
        ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        ServerError::Pipeline(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.user_message()),
        ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
    };
    with_job(job_id, || log_error(format!("[{}] {}", job_id, err)));
    (status, Json(error_response(job_id, &message)))
}

fn pipeline_error(job_id: &str, err: PipelineError) -> ApiError {
    api_error(job_id, ServerError::Pipeline(err))
}

/// Read the multipart body. Errors before the form is parsed get a fresh job id.
async fn read_form(multipart: Multipart) -> Result<(String, UploadForm), ApiError> {
    let form = UploadForm::read(multipart)
        .await
        .map_err(|e| api_error(&Uuid::new_v4().to_string(), e))?;
    Ok((form.job_id(), form))
}

/// Run pipeline work off the async runtime, logging under `job_id`.
async fn run_blocking<T, F>(job_id: &str, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
{
    let job = job_id.to_string();
    tokio::task::spawn_blocking(move || with_job(&job, work))
        .await
        .map_err(|e| api_error(job_id, ServerError::Internal(format!("Worker failed: {}", e))))?
        .map_err(|e| pipeline_error(job_id, e))
}

/// Filtered CSV download
async fn filter_csv(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let (job_id, mut form) = read_form(multipart).await?;

    let bytes = form.take_file().map_err(|e| api_error(&job_id, e))?;
    let request = TransformRequest {
        term: form.term().map_err(|e| api_error(&job_id, e))?,
        mode: form
            .mode(SelectionMode::ExcludePrefix)
            .map_err(|e| api_error(&job_id, e))?,
        output: OutputKind::Csv,
    };

    print_upload_banner(&job_id, form.file_name.as_deref(), bytes.len());
    let config = Arc::clone(&state.config);
    let output =
        run_blocking(&job_id, move || transform_bytes(&bytes, &request, &config)).await?;

    download(&job_id, output)
}

/// Workbook download
async fn export_workbook(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let (job_id, mut form) = read_form(multipart).await?;

    let bytes = form.take_file().map_err(|e| api_error(&job_id, e))?;
    let metadata = ReportMetadata::new(
        form.text("teacher"),
        form.text("subject"),
        form.text("course"),
        form.text("level"),
    );
    let request = TransformRequest {
        term: form.term().map_err(|e| api_error(&job_id, e))?,
        mode: form
            .mode(SelectionMode::CodedRange)
            .map_err(|e| api_error(&job_id, e))?,
        output: OutputKind::Workbook {
            metadata,
            options: RecodeOptions {
                averages: form.flag("averages"),
                spacers: form.flag("spacers"),
            },
        },
    };

    print_upload_banner(&job_id, form.file_name.as_deref(), bytes.len());
    let config = Arc::clone(&state.config);
    let output =
        run_blocking(&job_id, move || transform_bytes(&bytes, &request, &config)).await?;

    download(&job_id, output)
}

/// First rows of a selection
async fn preview_csv(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<PreviewResponse>, ApiError> {
    let (job_id, mut form) = read_form(multipart).await?;

    let bytes = form.take_file().map_err(|e| api_error(&job_id, e))?;
    let term = form.term().map_err(|e| api_error(&job_id, e))?;
    let mode = form
        .mode(SelectionMode::ExcludePrefix)
        .map_err(|e| api_error(&job_id, e))?;
    let rows = form.text("rows").parse().unwrap_or(DEFAULT_PREVIEW_ROWS);

    let config = Arc::clone(&state.config);
    let result =
        run_blocking(&job_id, move || preview(&bytes, term, mode, rows, &config)).await?;

    Ok(Json(PreviewResponse::new(job_id, result)))
}

fn download(job_id: &str, output: TransformOutput) -> Result<Response, ApiError> {
    print_summary(&DownloadSummary::new(job_id.to_string(), &output));

    let headers = [
        (header::CONTENT_TYPE, output.content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", output.file_name),
        ),
        (HeaderName::from_static(JOB_ID_HEADER), job_id.to_string()),
    ];

    Ok((headers, output.bytes).into_response())
}

fn print_upload_banner(job_id: &str, file_name: Option<&str>, size: usize) {
    println!("\n{}", "=".repeat(70));
    println!(
        "📄 NEW UPLOAD: {} ({} bytes) [{}]",
        file_name.unwrap_or("unknown"),
        size,
        job_id
    );
    println!("{}\n", "=".repeat(70));
}

fn print_summary(summary: &DownloadSummary) {
    println!("\n{}", "=".repeat(70));
    println!("📊 SUMMARY");
    println!("{}", "=".repeat(70));
    println!("   File:           {}", summary.file_name);
    println!("   Size:           {} bytes", summary.size);
    println!("   Input rows:     {}", summary.input.row_count);
    println!(
        "   Columns:        {} → {}",
        summary.input.column_count,
        summary.columns.len()
    );
    for group in &summary.groups {
        println!("   {:<15} {} columns", format!("{}:", group.category), group.columns);
    }
    println!("{}\n", "=".repeat(70));
}
