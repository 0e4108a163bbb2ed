// Request bodies for notebook endpoints
// Required fields are optional here so missing ones surface as ValidationError, not a 422

use chrono::NaiveDate;
use serde::Deserialize;

/// POST /v1/notebooks
#[derive(Debug, Clone, Deserialize)]
pub struct CreateNotebookRequest {
    pub template_id: Option<String>,
    pub notebook_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Defaults to today
    #[serde(default)]
    pub planted_date: Option<NaiveDate>,
}

/// PATCH /v1/notebooks/:id
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateNotebookRequest {
    pub notebook_name: Option<String>,
    pub description: Option<String>,
}

/// POST /v1/notebooks/:id/checklist/complete
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteTaskRequest {
    pub task_name: Option<String>,
}

/// POST /v1/notebooks/:id/observations
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateObservationRequest {
    pub observation_key: Option<String>,
    pub value: Option<bool>,
}

/// POST /v1/notebooks/:id/daily/overdue/skip
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SkipOverdueRequest {
    /// Defaults to the earliest unresolved day
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// POST /v1/notebooks/:id/daily/overdue/complete
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteOverdueRequest {
    pub task_name: Option<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// POST /v1/notebooks/:id/daily/overdue/complete-bulk
#[derive(Debug, Clone, Deserialize)]
pub struct CompleteOverdueBulkRequest {
    #[serde(default)]
    pub task_names: Vec<String>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// POST /v1/notebooks/:id/advice
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdviceRequest {
    #[serde(default)]
    pub question: Option<String>,
}
