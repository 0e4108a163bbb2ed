// Error types shared by the engine, services and routes

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::StoreError;

pub const NOTEBOOK_LIMIT_EXCEEDED: &str = "NOTEBOOK_LIMIT_EXCEEDED";

#[derive(Debug, Error)]
pub enum AppError {
    /// Notebook, template or task name absent
    #[error("{0}")]
    NotFound(String),

    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Free-tier notebook cap reached
    #[error("notebook limit reached: {current_count}/{max_allowed}")]
    LimitExceeded {
        current_count: usize,
        max_allowed: usize,
    },

    /// Failed call to an external API
    #[error("upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::LimitExceeded { .. } => StatusCode::FORBIDDEN,
            AppError::Upstream { status, .. } if *status == 503 => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the user
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(msg) | AppError::Validation(msg) => msg.clone(),
            AppError::LimitExceeded { max_allowed, .. } => format!(
                "Gói miễn phí chỉ cho phép tối đa {} sổ tay đang hoạt động. Vui lòng nâng cấp để tạo thêm.",
                max_allowed
            ),
            AppError::Upstream { .. } => {
                "Dịch vụ bên ngoài tạm thời không khả dụng, vui lòng thử lại sau.".to_string()
            }
            AppError::Unauthorized(_) => "Vui lòng đăng nhập để tiếp tục.".to_string(),
            AppError::Storage(_) => "Đã xảy ra lỗi máy chủ, vui lòng thử lại sau.".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::info!("Request rejected ({}): {}", status.as_u16(), self);
        }

        let mut body = json!({
            "success": false,
            "message": self.user_message(),
        });

        if let AppError::LimitExceeded {
            current_count,
            max_allowed,
        } = &self
        {
            body["code"] = json!(NOTEBOOK_LIMIT_EXCEEDED);
            body["data"] = json!({
                "currentCount": current_count,
                "maxAllowed": max_allowed,
            });
        }

        (status, Json(body)).into_response()
    }
}
