//! HTTP surface for the payload.
//!
//! Serves FetchPayload to the dashboard. Authentication and sessions are
//! the hosting platform's concern and are not handled here.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/payload` | Reassembled payload JSON (cached) |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "prerequisite_not_met", "message": "store table 'readiness_chunks' does not exist; run ingest first" } }
//! ```
//!
//! Error codes: `prerequisite_not_met` (503, retry after an ingest),
//! `internal` (500).

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::backends::Backends;
use crate::config::Config;
use crate::error::FetchError;
use crate::fetch::fetch_payload;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    backends: Backends,
}

/// Build the router. Split out so tests can drive it without binding.
pub fn router(config: Arc<Config>, backends: Backends) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/payload", get(handle_payload))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { config, backends })
}

/// Starts the HTTP server on `[server].bind` and runs until terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let backends = Backends::open(config).await?;
    let app = router(Arc::new(config.clone()), backends);

    info!(bind = %bind_addr, "payload server listening");
    println!("Payload server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

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

impl From<FetchError> for AppError {
    fn from(err: FetchError) -> Self {
        if err.is_prerequisite() {
            AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "prerequisite_not_met".to_string(),
                message: err.to_string(),
            }
        } else {
            error!(error = %err, "payload request failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal".to_string(),
                message: err.to_string(),
            }
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

// ============ GET /payload ============

/// The payload is already serialized (and possibly cached as text), so it
/// is returned verbatim rather than re-encoded through `Json`.
async fn handle_payload(State(state): State<AppState>) -> Result<Response, AppError> {
    let fetched = fetch_payload(&state.config, &state.backends).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        fetched.json,
    )
        .into_response())
}
