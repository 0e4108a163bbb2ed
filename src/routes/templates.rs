// Plant template routes
// Endpoint: GET /v1/templates/{id}

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::models::{ApiResponse, PlantTemplate};
use crate::AppState;

/// GET /v1/templates/{id} - Stage and task blueprint of a plant
async fn get_template(
    State(state): State<AppState>,
    user: AuthUser,
    Path(template_id): Path<String>,
) -> Result<Json<ApiResponse<PlantTemplate>>, AppError> {
    tracing::info!("Getting template {} for user {}", template_id, user.uid);

    let template = state.notebooks.load_template(&template_id).await?;
    Ok(Json(ApiResponse::success(template)))
}

pub fn templates_routes() -> Router<AppState> {
    Router::new().route("/v1/templates/:id", get(get_template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::{state, user};

    #[tokio::test]
    async fn test_get_template() {
        let (state, _, _) = state().await;
        let Json(body) = get_template(State(state.clone()), user("user-1"), Path("tpl-tomato".to_string()))
            .await
            .unwrap();
        assert!(body.success);
        assert_eq!(body.data.stage_count(), 3);

        let missing = get_template(State(state), user("user-1"), Path("nope".to_string())).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }
}
