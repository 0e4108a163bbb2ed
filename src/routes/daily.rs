// Daily status and overdue routes
// Endpoints: GET /v1/notebooks/{id}/daily/status,
// POST /v1/notebooks/{id}/daily/overdue/{skip,complete,complete-bulk}

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{
    ApiResponse, CompleteOverdueBulkRequest, CompleteOverdueRequest, DailyStatusResponse,
    SkipOverdueRequest,
};
use crate::progress::OverdueOutcome;
use crate::AppState;

/// GET /v1/notebooks/{id}/daily/status - Today's checklist plus any overdue day
async fn get_daily_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
) -> Result<Json<ApiResponse<DailyStatusResponse>>, AppError> {
    tracing::info!("Getting daily status of notebook {} for user {}", notebook_id, user.uid);

    let status = state.notebooks.get_daily_status(&user.uid, &notebook_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// POST /v1/notebooks/{id}/daily/overdue/skip - Body is optional
async fn skip_overdue(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
    body: Option<Json<SkipOverdueRequest>>,
) -> Result<Json<ApiResponse<OverdueOutcome>>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    tracing::info!(
        "Skipping overdue tasks of notebook {} for user {} (date={:?})",
        notebook_id,
        user.uid,
        request.date
    );

    let outcome = state
        .notebooks
        .skip_overdue_tasks(&user.uid, &notebook_id, request.date)
        .await?;
    Ok(Json(
        ApiResponse::success(outcome).with_message("Đã bỏ qua công việc quá hạn"),
    ))
}

/// POST /v1/notebooks/{id}/daily/overdue/complete
async fn complete_overdue(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
    Json(request): Json<CompleteOverdueRequest>,
) -> Result<Json<ApiResponse<OverdueOutcome>>, AppError> {
    let task_name = request
        .task_name
        .ok_or_else(|| AppError::Validation("Thiếu tên công việc (task_name)".to_string()))?;
    tracing::info!(
        "Completing overdue task '{}' of notebook {} for user {}",
        task_name,
        notebook_id,
        user.uid
    );

    let outcome = state
        .notebooks
        .complete_overdue_task(&user.uid, &notebook_id, &task_name, request.date)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// POST /v1/notebooks/{id}/daily/overdue/complete-bulk
async fn complete_overdue_bulk(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
    Json(request): Json<CompleteOverdueBulkRequest>,
) -> Result<Json<ApiResponse<OverdueOutcome>>, AppError> {
    tracing::info!(
        "Completing {} overdue tasks of notebook {} for user {}",
        request.task_names.len(),
        notebook_id,
        user.uid
    );

    let outcome = state
        .notebooks
        .complete_overdue_tasks_bulk(&user.uid, &notebook_id, &request.task_names, request.date)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

pub fn daily_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/notebooks/:id/daily/status", get(get_daily_status))
        .route("/v1/notebooks/:id/daily/overdue/skip", post(skip_overdue))
        .route("/v1/notebooks/:id/daily/overdue/complete", post(complete_overdue))
        .route(
            "/v1/notebooks/:id/daily/overdue/complete-bulk",
            post(complete_overdue_bulk),
        )
}
