// SORDAS Business Registry - Web Server
// JSON API over the registry core: filtered listing, analytics, uploads,
// classification, and the two report downloads.
//
// The raw query string is handed verbatim to the filter builder, so the
// list, export, and classify endpoints share one filter contract.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Path as UrlPath, Query, RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use sordas::classify::ClassifierConfig;
use sordas::filter::FilterSpec;
use sordas::{analytics, classify, db, ingest, report};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/businesses[?<filter tokens>] - Filtered, ordered registry
async fn list_businesses(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Response {
    let conn = state.db.lock().unwrap();

    match db::load_business_rows(&conn) {
        Ok(rows) => {
            let filtered = FilterSpec::parse(raw.as_deref().unwrap_or("")).apply(rows);
            (StatusCode::OK, Json(ApiResponse::ok(filtered))).into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<Vec<sordas::BusinessRow>>::err(e.to_string())),
        )
            .into_response(),
    }
}

/// GET /api/analytics - Dashboard payload for the latest filing year
async fn analytics_latest(State(state): State<AppState>) -> Response {
    let conn = state.db.lock().unwrap();
    analytics_response(&conn, None)
}

/// GET /api/analytics/:year - Dashboard payload for one filing year
async fn analytics_for_year(
    State(state): State<AppState>,
    UrlPath(year): UrlPath<String>,
) -> Response {
    let Ok(year) = year.parse::<i32>() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<analytics::YearAnalytics>::err(format!(
                "'{}' is not a year",
                year
            ))),
        )
            .into_response();
    };

    let conn = state.db.lock().unwrap();
    analytics_response(&conn, Some(year))
}

fn analytics_response(conn: &Connection, year: Option<i32>) -> Response {
    match analytics::year_analytics(conn, year) {
        Ok(summary) => (StatusCode::OK, Json(ApiResponse::ok(summary))).into_response(),
        // A year with no data is an error state, not an empty payload
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<analytics::YearAnalytics>::err(e.to_string())),
        )
            .into_response(),
    }
}

/// POST /api/classify[?<filter tokens>] - Assign sectors to unverified
/// businesses matched by the filter
async fn run_classifier(
    State(state): State<AppState>,
    RawQuery(raw): RawQuery,
) -> Response {
    let mut conn = state.db.lock().unwrap();

    match classify::classify_unverified(
        &mut conn,
        raw.as_deref().unwrap_or(""),
        &ClassifierConfig::default(),
    ) {
        Ok(assignments) => (StatusCode::OK, Json(ApiResponse::ok(assignments))).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<Vec<classify::Assignment>>::err(e.to_string())),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct UploadParams {
    filename: String,
}

/// POST /api/upload?filename=<name> - Ingest an uploaded spreadsheet
async fn upload_spreadsheet(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Response {
    // Keep only the final path component of the client-supplied name
    let Some(file_name) = Path::new(&params.filename)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<ingest::IngestReport>::err("missing filename")),
        )
            .into_response();
    };

    // Extension validation happens before any parsing
    if let Err(e) = ingest::validate_extension(&file_name) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<ingest::IngestReport>::err(e.to_string())),
        )
            .into_response();
    }

    let spool_path = std::env::temp_dir().join(&file_name);
    if let Err(e) = std::fs::write(&spool_path, &body) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<ingest::IngestReport>::err(e.to_string())),
        )
            .into_response();
    }

    let mut conn = state.db.lock().unwrap();
    let result = ingest::ingest_file(&mut conn, &spool_path);
    let _ = std::fs::remove_file(&spool_path);

    match result {
        Ok(ingest_report) => {
            (StatusCode::OK, Json(ApiResponse::ok(ingest_report))).into_response()
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<ingest::IngestReport>::err(e.to_string())),
        )
            .into_response(),
    }
}

/// GET /api/export/xlsx[?<filter tokens>] - XLSX download
async fn export_xlsx(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Response {
    export_response(&state, raw, "xlsx")
}

/// GET /api/export/pdf[?<filter tokens>] - PDF download
async fn export_pdf(State(state): State<AppState>, RawQuery(raw): RawQuery) -> Response {
    export_response(&state, raw, "pdf")
}

fn export_response(state: &AppState, raw: Option<String>, kind: &str) -> Response {
    let conn = state.db.lock().unwrap();

    let rows = match db::load_business_rows(&conn) {
        Ok(rows) => FilterSpec::parse(raw.as_deref().unwrap_or("")).apply(rows),
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<String>::err(e.to_string())),
            )
                .into_response();
        }
    };

    let (bytes, content_type) = match kind {
        "xlsx" => (
            report::export_xlsx_bytes(&rows),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        _ => (report::export_pdf_bytes(&rows), "application/pdf"),
    };

    match bytes {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={}", report::export_file_name(kind)),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<String>::err(e.to_string())),
        )
            .into_response(),
    }
}

// ============================================================================
// Server setup
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let db_path = args.get(1).cloned().unwrap_or_else(|| "sordas.db".to_string());

    let conn = Connection::open(&db_path)?;
    db::setup_database(&conn)?;

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let app = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/businesses", get(list_businesses))
        .route("/api/analytics", get(analytics_latest))
        .route("/api/analytics/:year", get(analytics_for_year))
        .route("/api/classify", post(run_classifier))
        .route("/api/upload", post(upload_spreadsheet))
        .route("/api/export/xlsx", get(export_xlsx))
        .route("/api/export/pdf", get(export_pdf))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = "0.0.0.0:8000".parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    println!("SORDAS registry API on http://{} (database: {})", addr, db_path);
    axum::serve(listener, app).await?;

    Ok(())
}
