use chrono::{DateTime, Utc};
use shared::{
    domain::{normalize_annotator_name, Annotator, AnnotatorId},
    error::ApiError,
    protocol::{AnnotatorTimer, DeleteAnnotatorResponse},
    timer::TimerBoard,
};
use storage::Storage;
use tracing::{error, info};

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }
}

pub async fn list_annotators(ctx: &ApiContext) -> Result<Vec<Annotator>, ApiError> {
    ctx.storage
        .list_annotators()
        .await
        .map_err(|e| storage_failure("failed to fetch annotators", e))
}

/// Lists annotators with their timer state derived at `now`.
pub async fn list_annotator_timers(
    ctx: &ApiContext,
    now: DateTime<Utc>,
) -> Result<Vec<AnnotatorTimer>, ApiError> {
    let board = load_board(ctx).await?;
    Ok(board.view_at(now))
}

/// Reads a fresh snapshot for a display refresh loop.
pub async fn load_board(ctx: &ApiContext) -> Result<TimerBoard, ApiError> {
    list_annotators(ctx).await.map(TimerBoard::new)
}

pub async fn create_annotator(ctx: &ApiContext, name: &str) -> Result<Annotator, ApiError> {
    let Some(name) = normalize_annotator_name(name) else {
        return Err(ApiError::validation("annotator name must not be empty"));
    };
    let annotator = ctx
        .storage
        .create_annotator(name)
        .await
        .map_err(|e| storage_failure("failed to create annotator", e))?;
    info!(annotator_id = annotator.id.0, "annotator created");
    Ok(annotator)
}

pub async fn delete_annotator(
    ctx: &ApiContext,
    id: AnnotatorId,
) -> Result<DeleteAnnotatorResponse, ApiError> {
    let deleted = ctx
        .storage
        .delete_annotator(id)
        .await
        .map_err(|e| storage_failure("failed to delete annotator", e))?;
    if !deleted {
        return Err(not_found(id));
    }
    info!(annotator_id = id.0, "annotator deleted");
    Ok(DeleteAnnotatorResponse { success: true })
}

pub async fn start_timer(ctx: &ApiContext, id: AnnotatorId) -> Result<Annotator, ApiError> {
    start_timer_at(ctx, id, Utc::now()).await
}

/// Concurrent starts on the same id overwrite each other; the last write wins.
async fn start_timer_at(
    ctx: &ApiContext,
    id: AnnotatorId,
    now: DateTime<Utc>,
) -> Result<Annotator, ApiError> {
    let annotator = ctx
        .storage
        .set_start_time(id, Some(now))
        .await
        .map_err(|e| storage_failure("failed to start timer", e))?
        .ok_or_else(|| not_found(id))?;
    info!(annotator_id = id.0, started_at = %now, "timer started");
    Ok(annotator)
}

pub async fn reset_timer(ctx: &ApiContext, id: AnnotatorId) -> Result<Annotator, ApiError> {
    let annotator = ctx
        .storage
        .set_start_time(id, None)
        .await
        .map_err(|e| storage_failure("failed to reset timer", e))?
        .ok_or_else(|| not_found(id))?;
    info!(annotator_id = id.0, "timer reset");
    Ok(annotator)
}

fn not_found(id: AnnotatorId) -> ApiError {
    ApiError::not_found(format!("annotator {id} not found"))
}

fn storage_failure(message: &str, err: anyhow::Error) -> ApiError {
    error!(error = %format!("{err:#}"), "{message}");
    ApiError::storage(message)
}
