// Compliance Sentinel - Web Server
// REST API with Axum: alerts, masked assistant chat, CSV export

use anyhow::{anyhow, Context};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Local;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use compliance_sentinel::{
    alert_stats, get_flagged_transactions, ingest_transactions, open_database, render_flagged_csv,
    report_filename, AlertStats, ComplianceAssistant, OfflineTextService, RuleEvaluationEngine,
    SentinelConfig, SentinelError, StoredAlert, TransactionFeed,
};

/// Alerts returned per poll
const ALERT_PAGE_SIZE: usize = 100;

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
    engine: Arc<RuleEvaluationEngine>,
    assistant: Arc<ComplianceAssistant>,
    config: Arc<SentinelConfig>,
}

impl AppState {
    fn db(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal(anyhow!("database lock poisoned")))
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{:#}", err), "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
        }
    }
}

impl From<SentinelError> for ApiError {
    fn from(err: SentinelError) -> Self {
        let status = match err {
            SentinelError::InvalidRequest(_) | SentinelError::ReservedToken { .. } => {
                StatusCode::BAD_REQUEST
            }
            SentinelError::AssistantUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return ApiError::internal(err.into());
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

// ============================================================================
// API Handlers
// ============================================================================

#[derive(Serialize)]
struct AlertsResponse {
    alerts: Vec<StoredAlert>,
    stats: AlertStats,
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    context: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "version": compliance_sentinel::VERSION }))
}

/// GET /api/alerts - Poll the feed, then list flagged transactions and counters
async fn get_alerts(State(state): State<AppState>) -> Result<Json<AlertsResponse>, ApiError> {
    poll_and_list(&state).map(Json)
}

fn poll_and_list(state: &AppState) -> Result<AlertsResponse, ApiError> {
    let conn = state.db()?;

    let mut feed = TransactionFeed::new(state.config.catalogs.clone());
    let count = feed.random_batch_size(
        state.config.simulate_min_batch,
        state.config.simulate_max_batch,
    );
    let batch = feed.generate(count, Local::now().naive_local());
    ingest_transactions(&conn, &state.engine, &batch)?;

    let alerts = get_flagged_transactions(&conn, Some(ALERT_PAGE_SIZE))?;
    let stats = alert_stats(&conn)?;

    Ok(AlertsResponse { alerts, stats })
}

/// POST /api/chat - Ask the assistant about the supplied alert context
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let (message, context) = match (request.message, request.context) {
        (Some(message), Some(context)) if !message.trim().is_empty() => (message, context),
        _ => return Err(ApiError::bad_request("Message and context are required")),
    };

    let assistant = state.assistant.clone();
    let response = tokio::task::spawn_blocking(move || assistant.chat(&message, &context))
        .await
        .context("assistant task panicked")??;

    Ok(Json(ChatResponse { response }))
}

/// GET /api/export - Download every flagged transaction as CSV
async fn export_report(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = render_report(&state)?;
    let filename = report_filename(Local::now().date_naive());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", filename),
            ),
        ],
        body,
    )
        .into_response())
}

fn render_report(state: &AppState) -> Result<String, ApiError> {
    let conn = state.db()?;
    let alerts = get_flagged_transactions(&conn, None)?;
    Ok(render_flagged_csv(&alerts)?)
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/alerts", get(get_alerts))
        .route("/chat", post(chat))
        .route("/export", get(export_report))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🌐 Compliance Sentinel - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = SentinelConfig::load(None)?;
    let conn = open_database(&config.db_path)?;
    println!("✓ Database opened: {:?}", config.db_path);

    let engine = RuleEvaluationEngine::from_config(&config)?;
    println!("✓ Rules loaded: {}", engine.rules().names().join(", "));

    let assistant = ComplianceAssistant::new(
        config.catalogs.clone(),
        config.assistant.clone(),
        Arc::new(OfflineTextService),
    );

    let addr = config.bind_addr.clone();
    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
        engine: Arc::new(engine),
        assistant: Arc::new(assistant),
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/alerts", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}
