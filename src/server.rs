//! HTTP adapter.
//!
//! Exposes the interactive decrypt entry point and recovery status over a
//! small JSON API. Batch recovery is not started from here; it stays a
//! CLI operation.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/decrypt` | Decrypt a content reference or inline blob |
//! | `GET`  | `/status/{document_id}` | Recovery status and stored artifacts |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "decryption_failed", "message": "decryption failed: invalid PKCS#7 padding" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request`, `missing_key` | 400 |
//! | `not_found` | 404 |
//! | `decryption_failed`, `unsupported_format`, `malformed_artifact` | 422 |
//! | `fetch_exhausted` | 502 |
//! | `storage_failure`, `internal` | 500 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based review
//! tools can call the API directly.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::decrypt::{decrypt_input, DecryptRequest, DecryptResponse};
use crate::error::RecoveryError;
use crate::gateway::{BlobFetcher, GatewayFetcher};
use crate::status::{record_status, RecordStatusReport};
use crate::store::SqliteRecoveryStore;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<dyn BlobFetcher>,
    pub store: Arc<SqliteRecoveryStore>,
}

/// Build the router. Separate from [`run_server`] so tests can serve it on
/// an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/decrypt", post(handle_decrypt))
        .route("/status/{document_id}", get(handle_status))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until `shutdown` is cancelled.
pub async fn run_server(config: &Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let store = Arc::new(SqliteRecoveryStore::open(config).await?);
    let fetcher = Arc::new(GatewayFetcher::from_config(&config.gateways)?);
    let app = router(AppState {
        fetcher,
        store: store.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("docvault server listening on http://{}", config.server.bind);
    info!(bind = %config.server.bind, "server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    store.close().await;
    info!("server stopped");
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: message.into(),
    }
}

impl From<RecoveryError> for AppError {
    fn from(err: RecoveryError) -> Self {
        let status = match err {
            RecoveryError::MissingKey => StatusCode::BAD_REQUEST,
            RecoveryError::DecryptionFailed(_)
            | RecoveryError::UnsupportedFormat(_)
            | RecoveryError::MalformedArtifact { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            RecoveryError::FetchExhausted { .. } => StatusCode::BAD_GATEWAY,
            RecoveryError::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /decrypt ============

async fn handle_decrypt(
    State(state): State<AppState>,
    body: Result<Json<DecryptRequest>, JsonRejection>,
) -> Result<Json<DecryptResponse>, AppError> {
    let Json(request) = body.map_err(|e| bad_request(e.body_text()))?;
    let input = request.input().map_err(bad_request)?;

    let outcome = decrypt_input(
        state.fetcher.as_ref(),
        &input,
        request.decryption_key.as_deref(),
    )
    .await
    .map_err(|e| {
        warn!(code = e.code(), error = %e, "decrypt request failed");
        AppError::from(e)
    })?;

    Ok(Json(outcome.response()))
}

// ============ GET /status/{document_id} ============

async fn handle_status(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> Result<Json<RecordStatusReport>, AppError> {
    record_status(&state.store, &document_id)
        .await
        .map_err(|e| internal(e.to_string()))?
        .map(Json)
        .ok_or_else(|| not_found(format!("document not found: {}", document_id)))
}
