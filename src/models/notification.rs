// Notification models - events handed to the notification sink
// Path: notifications/{notification_id}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    StageCompleted,
    StageOverdue,
    StageReminder,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::StageCompleted => "stage_completed",
            NotificationType::StageOverdue => "stage_overdue",
            NotificationType::StageReminder => "stage_reminder",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    /// Deterministic per event so repeated emits overwrite instead of duplicating
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub notebook_id: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}
