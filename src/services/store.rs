// Storage and notification collaborators of the notebook engine

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Notebook, Notification, PlantTemplate, UserPlan};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("firestore returned {status}: {body}")]
    Firestore { status: u16, body: String },

    #[error("failed to decode document: {0}")]
    Decode(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

/// Document store holding notebooks
#[async_trait]
pub trait NotebookStore: Send + Sync {
    async fn get(&self, notebook_id: &str) -> Result<Option<Notebook>, StoreError>;

    /// Insert or overwrite the whole document
    async fn save(&self, notebook: &Notebook) -> Result<(), StoreError>;

    /// Hard delete; deleting a missing notebook is not an error
    async fn delete(&self, notebook_id: &str) -> Result<(), StoreError>;

    /// Notebooks of `user_id` with status "active"
    async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<Notebook>, StoreError>;
}

/// Read-only access to plant templates
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, template_id: &str) -> Result<Option<PlantTemplate>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Subscription of `user_id`; users without one are on the basic plan
    async fn get_user_plan(&self, user_id: &str) -> Result<UserPlan, StoreError>;
}

/// Fire-and-forget delivery of user notifications
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn emit(&self, notification: &Notification) -> Result<(), StoreError>;
}
