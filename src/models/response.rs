// Response envelope and composite payloads

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use super::notebook::OverdueSummary;
use crate::progress::ChecklistView;

/// `{success, data, message?, meta?}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            meta: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// GET /v1/notebooks/:id/checklist
#[derive(Debug, Clone, Serialize)]
pub struct ChecklistResponse {
    pub notebook_id: String,
    pub date: NaiveDate,
    pub current_stage: u32,
    pub stage_completion: f64,
    pub progress: f64,
    /// True once the notebook has no further checklist
    pub notebook_completed: bool,
    pub checklist: ChecklistView,
}

/// GET /v1/notebooks/:id/daily/status
#[derive(Debug, Clone, Serialize)]
pub struct DailyStatusResponse {
    #[serde(flatten)]
    pub today: ChecklistResponse,
    pub has_overdue: bool,
    pub overdue: Option<OverdueSummary>,
}
