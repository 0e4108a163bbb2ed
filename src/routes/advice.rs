// Plant-care advice route
// Endpoint: POST /v1/notebooks/{id}/advice

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::llm::Advice;
use crate::models::{AdviceRequest, ApiResponse};
use crate::AppState;

/// POST /v1/notebooks/{id}/advice - Ask Gemini about the current stage
async fn get_advice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(notebook_id): Path<String>,
    body: Option<Json<AdviceRequest>>,
) -> Result<Json<ApiResponse<Advice>>, AppError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    tracing::info!("Getting advice for notebook {} for user {}", notebook_id, user.uid);

    let (notebook, template) = state.notebooks.advice_context(&user.uid, &notebook_id).await?;
    let advice = state
        .advisor
        .advise(&notebook, &template, state.clock.today(), request.question.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(advice)))
}

pub fn advice_routes() -> Router<AppState> {
    Router::new().route("/v1/notebooks/:id/advice", post(get_advice))
}
