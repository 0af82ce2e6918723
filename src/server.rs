//! JSON HTTP shell over the intake and query entry points.
//!
//! A thin collaborator surface: upload, search, recency/browse, recipient
//! listing, and the credential endpoints. Token issuance, password hashing,
//! and UI rendering live outside this core — `/auth/login` only performs the
//! store's exact-match check on an already-hashed credential.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "content_base64 is not valid base64" } }
//! ```
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::models::SearchMode;
use crate::pipeline::Intake;

#[derive(Clone)]
struct AppState {
    intake: Arc<Intake>,
}

/// Start the HTTP server on `[server].bind`. Runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let intake = Arc::new(Intake::open(config).await?);
    run_server_with_intake(config, intake).await
}

/// Like [`run_server`], but over an already-open [`Intake`] (used by tests
/// and embedders that share the pipeline).
pub async fn run_server_with_intake(config: &Config, intake: Arc<Intake>) -> anyhow::Result<()> {
    let state = AppState { intake };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/documents", post(upload_document))
        .route("/search", post(run_search))
        .route("/recent", get(recent))
        .route("/recipients/{id}/documents", get(documents_for_recipient))
        .route("/users", post(create_user))
        .route("/auth/login", post(login))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[derive(Deserialize)]
struct UploadRequest {
    filename: String,
    content_base64: String,
    #[serde(default)]
    recipients: Vec<i64>,
    #[serde(default)]
    external_analysis: Option<serde_json::Value>,
}

async fn upload_document(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Response {
    let bytes = match BASE64.decode(&req.content_base64) {
        Ok(bytes) => bytes,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "bad_request",
                "content_base64 is not valid base64",
            )
        }
    };

    match state
        .intake
        .ingest(&req.filename, &bytes, req.external_analysis, &req.recipients)
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e),
    }
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_mode")]
    mode: SearchMode,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    filters: Option<serde_json::Map<String, serde_json::Value>>,
}

fn default_mode() -> SearchMode {
    SearchMode::Hybrid
}

async fn run_search(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Response {
    if req.query.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "bad_request", "query must not be empty");
    }
    match state
        .intake
        .search(&req.query, req.mode, req.limit, req.filters.as_ref())
        .await
    {
        Ok(hits) => Json(serde_json::json!({ "results": hits })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e),
    }
}

#[derive(Deserialize)]
struct RecentParams {
    #[serde(default = "default_recent_limit")]
    limit: i64,
}

fn default_recent_limit() -> i64 {
    20
}

async fn recent(State(state): State<AppState>, Query(params): Query<RecentParams>) -> Response {
    match state.intake.store().recent(params.limit).await {
        Ok(records) => Json(serde_json::json!({ "documents": records })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e),
    }
}

async fn documents_for_recipient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Response {
    match state.intake.store().documents_for_recipient(id).await {
        Ok(records) => Json(serde_json::json!({ "documents": records })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e),
    }
}

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    email: String,
    /// Already hashed by the caller; this core never sees plaintext.
    password_hash: String,
    #[serde(default = "default_role")]
    role: String,
}

fn default_role() -> String {
    "employee".to_string()
}

async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Response {
    match state
        .intake
        .store()
        .create_user(&req.username, &req.email, &req.password_hash, &req.role)
        .await
    {
        Ok(id) => Json(serde_json::json!({ "id": id })).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e),
    }
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password_hash: String,
}

async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Response {
    match state
        .intake
        .store()
        .authenticate_user(&req.username, &req.password_hash)
        .await
    {
        Ok(Some(user)) => Json(serde_json::json!({ "user": user })).into_response(),
        Ok(None) => error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "invalid credentials",
        ),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal", e),
    }
}

fn error_response(status: StatusCode, code: &str, message: impl ToString) -> Response {
    (
        status,
        Json(serde_json::json!({
            "error": { "code": code, "message": message.to_string() }
        })),
    )
        .into_response()
}
