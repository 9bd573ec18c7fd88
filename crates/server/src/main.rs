use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use server_api::{
    create_annotator, delete_annotator, list_annotator_timers, list_annotators, reset_timer,
    start_timer, ApiContext,
};
use shared::{
    domain::{Annotator, AnnotatorId},
    error::{ApiError, ErrorCode},
    protocol::{AnnotatorTimer, CreateAnnotatorRequest, DeleteAnnotatorResponse, TimerCommandRequest},
};
use storage::Storage;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

type HttpError = (StatusCode, Json<ApiError>);

#[derive(Debug, Deserialize)]
struct DeleteQuery {
    id: i64,
}

const MAX_REQUEST_BODY_BYTES: usize = 16 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = load_settings();
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            error = %format!("{error:#}"),
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let state = AppState::new(ApiContext::new(storage));
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, %database_url, "annotator tracker listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/api/annotators",
            get(http_list_annotators)
                .post(http_create_annotator)
                .delete(http_delete_annotator),
        )
        .route("/api/annotators/timers", get(http_list_timers))
        .route("/api/annotators/start", post(http_start_timer))
        .route("/api/annotators/reset", post(http_reset_timer))
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .with_state(state)
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, HttpError> {
    state.api.storage.health_check().await.map_err(|e| {
        error!(error = %format!("{e:#}"), "health check failed");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiError::storage("storage unavailable")),
        )
    })?;
    Ok("ok")
}

async fn http_list_annotators(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Annotator>>, HttpError> {
    list_annotators(&state.api)
        .await
        .map(Json)
        .map_err(http_error)
}

async fn http_list_timers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<AnnotatorTimer>>, HttpError> {
    list_annotator_timers(&state.api, Utc::now())
        .await
        .map(Json)
        .map_err(http_error)
}

async fn http_create_annotator(
    State(state): State<Arc<AppState>>,
    req: Result<Json<CreateAnnotatorRequest>, JsonRejection>,
) -> Result<Json<Annotator>, HttpError> {
    let Json(req) = req.map_err(json_rejected)?;
    create_annotator(&state.api, &req.name)
        .await
        .map(Json)
        .map_err(http_error)
}

async fn http_delete_annotator(
    State(state): State<Arc<AppState>>,
    q: Result<Query<DeleteQuery>, QueryRejection>,
) -> Result<Json<DeleteAnnotatorResponse>, HttpError> {
    let Query(q) = q.map_err(query_rejected)?;
    delete_annotator(&state.api, AnnotatorId(q.id))
        .await
        .map(Json)
        .map_err(http_error)
}

async fn http_start_timer(
    State(state): State<Arc<AppState>>,
    req: Result<Json<TimerCommandRequest>, JsonRejection>,
) -> Result<Json<Annotator>, HttpError> {
    let Json(req) = req.map_err(json_rejected)?;
    start_timer(&state.api, req.id)
        .await
        .map(Json)
        .map_err(http_error)
}

async fn http_reset_timer(
    State(state): State<Arc<AppState>>,
    req: Result<Json<TimerCommandRequest>, JsonRejection>,
) -> Result<Json<Annotator>, HttpError> {
    let Json(req) = req.map_err(json_rejected)?;
    reset_timer(&state.api, req.id)
        .await
        .map(Json)
        .map_err(http_error)
}

fn http_error(err: ApiError) -> HttpError {
    let status = match err.code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(err))
}

fn json_rejected(rejection: JsonRejection) -> HttpError {
    rejected(rejection.status(), rejection.body_text())
}

fn query_rejected(rejection: QueryRejection) -> HttpError {
    rejected(rejection.status(), rejection.body_text())
}

/// Malformed input is a validation error; an oversized body keeps its 413.
fn rejected(status: StatusCode, message: String) -> HttpError {
    let status = if status == StatusCode::PAYLOAD_TOO_LARGE {
        status
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(ApiError::validation(message)))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
