// Daily checklist and observation routes
// Endpoints: GET /v1/notebooks/{id}/checklist, POST /v1/notebooks/{id}/checklist/complete,
// GET/POST /v1/notebooks/{id}/observations

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{ApiResponse, ChecklistResponse, CompleteTaskRequest, UpdateObservationRequest};
use crate::progress::{ObservationUpdate, StageObservations, TaskToggle};
use crate::AppState;

/// GET /v1/notebooks/{id}/checklist - Today's tasks for the current stage
async fn get_checklist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
) -> Result<Json<ApiResponse<ChecklistResponse>>, AppError> {
    tracing::info!("Getting checklist of notebook {} for user {}", notebook_id, user.uid);

    let checklist = state
        .notebooks
        .get_daily_checklist(&user.uid, &notebook_id)
        .await?;
    Ok(Json(ApiResponse::success(checklist)))
}

/// POST /v1/notebooks/{id}/checklist/complete - Toggle one of today's tasks
async fn complete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
    Json(request): Json<CompleteTaskRequest>,
) -> Result<Json<ApiResponse<TaskToggle>>, AppError> {
    let task_name = request
        .task_name
        .ok_or_else(|| AppError::Validation("Thiếu tên công việc (task_name)".to_string()))?;
    tracing::info!(
        "Toggling task '{}' of notebook {} for user {}",
        task_name,
        notebook_id,
        user.uid
    );

    let toggle = state
        .notebooks
        .complete_task(&user.uid, &notebook_id, &task_name)
        .await?;
    let meta = json!({ "stage_transitioned": toggle.transition.is_some() });
    Ok(Json(ApiResponse::success(toggle).with_meta(meta)))
}

/// GET /v1/notebooks/{id}/observations - Observation keys of the current stage
async fn get_observations(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
) -> Result<Json<ApiResponse<StageObservations>>, AppError> {
    tracing::info!("Getting observations of notebook {} for user {}", notebook_id, user.uid);

    let observations = state.notebooks.get_observations(&user.uid, &notebook_id).await?;
    Ok(Json(ApiResponse::success(observations)))
}

/// POST /v1/notebooks/{id}/observations - Record one observation
async fn update_observation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
    Json(request): Json<UpdateObservationRequest>,
) -> Result<Json<ApiResponse<ObservationUpdate>>, AppError> {
    let key = request
        .observation_key
        .ok_or_else(|| AppError::Validation("Thiếu mã quan sát (observation_key)".to_string()))?;
    let value = request
        .value
        .ok_or_else(|| AppError::Validation("Thiếu giá trị quan sát (value)".to_string()))?;
    tracing::info!(
        "Recording observation {}={} on notebook {} for user {}",
        key,
        value,
        notebook_id,
        user.uid
    );

    let update = state
        .notebooks
        .update_observation(&user.uid, &notebook_id, &key, value)
        .await?;
    let meta = json!({ "auto_transitioned": update.auto_transitioned() });
    Ok(Json(ApiResponse::success(update).with_meta(meta)))
}

pub fn checklist_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/notebooks/:id/checklist", get(get_checklist))
        .route("/v1/notebooks/:id/checklist/complete", post(complete_task))
        .route(
            "/v1/notebooks/:id/observations",
            get(get_observations).post(update_observation),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateNotebookRequest, Notebook};
    use crate::routes::testing::{state, user};
    use crate::AppState;

    async fn notebook(state: &AppState) -> Notebook {
        state
            .notebooks
            .create_notebook(
                "user-1",
                CreateNotebookRequest {
                    template_id: Some("tpl-tomato".to_string()),
                    notebook_name: Some("Ban công".to_string()),
                    description: None,
                    planted_date: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_checklist_lists_stage_one_tasks() {
        let (state, _, _) = state().await;
        let nb = notebook(&state).await;

        let Json(body) = get_checklist(State(state), user("user-1"), Path(nb.id)).await.unwrap();
        assert_eq!(body.data.current_stage, 1);
        assert_eq!(body.data.stage_completion, 0.0);
        assert_eq!(body.data.checklist.items().len(), 2);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_state() {
        let (state, _, _) = state().await;
        let nb = notebook(&state).await;
        let body = || CompleteTaskRequest {
            task_name: Some("Tưới nước".to_string()),
        };

        let Json(first) = complete_task(State(state.clone()), user("user-1"), Path(nb.id.clone()), Json(body()))
            .await
            .unwrap();
        assert!(first.data.is_completed);

        let Json(second) = complete_task(State(state), user("user-1"), Path(nb.id), Json(body()))
            .await
            .unwrap();
        assert!(!second.data.is_completed);
        assert_eq!(second.data.stage_completion, 0.0);
    }

    #[tokio::test]
    async fn test_observations_complete_stage() {
        let (state, _, _) = state().await;
        let nb = notebook(&state).await;
        let record = |key: &str| UpdateObservationRequest {
            observation_key: Some(key.to_string()),
            value: Some(true),
        };

        let Json(first) = update_observation(
            State(state.clone()),
            user("user-1"),
            Path(nb.id.clone()),
            Json(record("mam_nhu")),
        )
        .await
        .unwrap();
        assert_eq!(first.meta, Some(json!({ "auto_transitioned": false })));

        let Json(second) = update_observation(
            State(state.clone()),
            user("user-1"),
            Path(nb.id.clone()),
            Json(record("la_mam")),
        )
        .await
        .unwrap();
        assert_eq!(second.meta, Some(json!({ "auto_transitioned": true })));

        let Json(observations) = get_observations(State(state), user("user-1"), Path(nb.id))
            .await
            .unwrap();
        assert_eq!(observations.data.stage_number, 2);
    }

    #[tokio::test]
    async fn test_missing_observation_value_is_rejected() {
        let (state, _, _) = state().await;
        let nb = notebook(&state).await;
        let err = update_observation(
            State(state),
            user("user-1"),
            Path(nb.id),
            Json(UpdateObservationRequest {
                observation_key: Some("mam_nhu".to_string()),
                value: None,
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
