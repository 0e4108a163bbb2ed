// Notebook routes
// Endpoints: GET/POST /v1/notebooks, GET/PATCH/DELETE /v1/notebooks/{id},
// POST /v1/notebooks/{id}/restore, DELETE /v1/notebooks/{id}/permanent

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{ApiResponse, CreateNotebookRequest, Notebook, UpdateNotebookRequest};
use crate::AppState;

/// GET /v1/notebooks - Active notebooks of the caller
async fn list_notebooks(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Notebook>>>, AppError> {
    tracing::info!("Listing notebooks for user {}", user.uid);

    let notebooks = state.notebooks.list_notebooks(&user.uid).await?;
    let count = notebooks.len();
    Ok(Json(
        ApiResponse::success(notebooks).with_meta(json!({ "count": count })),
    ))
}

/// POST /v1/notebooks - Start a notebook from a plant template
async fn create_notebook(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateNotebookRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Notebook>>), AppError> {
    tracing::info!(
        "Creating notebook for user {} with template={:?}, planted_date={:?}",
        user.uid,
        request.template_id,
        request.planted_date
    );

    let notebook = state.notebooks.create_notebook(&user.uid, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(notebook).with_message("Đã tạo sổ tay")),
    ))
}

/// GET /v1/notebooks/{id}
async fn get_notebook(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
) -> Result<Json<ApiResponse<Notebook>>, AppError> {
    tracing::info!("Getting notebook {} for user {}", notebook_id, user.uid);

    let notebook = state.notebooks.get_notebook(&user.uid, &notebook_id).await?;
    Ok(Json(ApiResponse::success(notebook)))
}

/// PATCH /v1/notebooks/{id} - Rename or re-describe
async fn update_notebook(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
    Json(request): Json<UpdateNotebookRequest>,
) -> Result<Json<ApiResponse<Notebook>>, AppError> {
    tracing::info!("Updating notebook {} for user {}", notebook_id, user.uid);

    let notebook = state
        .notebooks
        .update_notebook(&user.uid, &notebook_id, request)
        .await?;
    Ok(Json(ApiResponse::success(notebook)))
}

/// DELETE /v1/notebooks/{id} - Soft delete
async fn delete_notebook(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    tracing::info!("Deleting notebook {} for user {}", notebook_id, user.uid);

    state.notebooks.delete_notebook(&user.uid, &notebook_id).await?;
    Ok(Json(
        ApiResponse::success(json!({ "id": notebook_id })).with_message("Đã chuyển sổ tay vào thùng rác"),
    ))
}

/// POST /v1/notebooks/{id}/restore
async fn restore_notebook(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
) -> Result<Json<ApiResponse<Notebook>>, AppError> {
    tracing::info!("Restoring notebook {} for user {}", notebook_id, user.uid);

    let notebook = state.notebooks.restore_notebook(&user.uid, &notebook_id).await?;
    Ok(Json(ApiResponse::success(notebook).with_message("Đã khôi phục sổ tay")))
}

/// DELETE /v1/notebooks/{id}/permanent
async fn purge_notebook(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, AppError> {
    tracing::info!("Permanently deleting notebook {} for user {}", notebook_id, user.uid);

    state.notebooks.purge_notebook(&user.uid, &notebook_id).await?;
    Ok(Json(
        ApiResponse::success(json!({ "id": notebook_id })).with_message("Đã xóa vĩnh viễn sổ tay"),
    ))
}

pub fn notebooks_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/notebooks", get(list_notebooks).post(create_notebook))
        .route(
            "/v1/notebooks/:id",
            get(get_notebook).patch(update_notebook).delete(delete_notebook),
        )
        .route("/v1/notebooks/:id/restore", post(restore_notebook))
        .route("/v1/notebooks/:id/permanent", delete(purge_notebook))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{state, user};
    use axum::response::IntoResponse;

    fn request(name: &str) -> CreateNotebookRequest {
        CreateNotebookRequest {
            template_id: Some("tpl-tomato".to_string()),
            notebook_name: Some(name.to_string()),
            description: None,
            planted_date: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_list() {
        let (state, _, _) = state().await;
        let (status, Json(created)) =
            create_notebook(State(state.clone()), user("user-1"), Json(request("Cà chua")))
                .await
                .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.data.notebook_name, "Cà chua");

        let Json(listed) = list_notebooks(State(state), user("user-1")).await.unwrap();
        assert_eq!(listed.data.len(), 1);
        assert_eq!(listed.meta, Some(json!({ "count": 1 })));
    }

    #[tokio::test]
    async fn test_fourth_notebook_on_basic_plan_is_forbidden() {
        let (state, _, _) = state().await;
        for i in 0..3 {
            create_notebook(State(state.clone()), user("user-1"), Json(request(&format!("NB {}", i))))
                .await
                .unwrap();
        }
        let err = create_notebook(State(state), user("user-1"), Json(request("NB 3")))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_name_is_bad_request() {
        let (state, _, _) = state().await;
        let mut body = request("x");
        body.notebook_name = None;
        let err = create_notebook(State(state), user("user-1"), Json(body))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (state, _, _) = state().await;
        let (_, Json(created)) =
            create_notebook(State(state.clone()), user("user-1"), Json(request("Cũ")))
                .await
                .unwrap();
        let id = created.data.id;

        let Json(updated) = update_notebook(
            State(state.clone()),
            user("user-1"),
            Path(id.clone()),
            Json(UpdateNotebookRequest {
                notebook_name: Some("Mới".to_string()),
                description: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.data.notebook_name, "Mới");

        delete_notebook(State(state.clone()), user("user-1"), Path(id.clone()))
            .await
            .unwrap();
        let err = get_notebook(State(state), user("user-1"), Path(id)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
