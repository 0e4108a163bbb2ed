// In-process store used when no Firestore project is configured, and by tests

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::store::{NotebookStore, NotificationSink, StoreError, TemplateStore, UserStore};
use crate::models::{Notebook, Notification, PlantTemplate, UserPlan};

#[derive(Default)]
pub struct MemoryStore {
    notebooks: RwLock<HashMap<String, Notebook>>,
    templates: RwLock<HashMap<String, PlantTemplate>>,
    plans: RwLock<HashMap<String, UserPlan>>,
    notifications: RwLock<HashMap<String, Notification>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_template(&self, template: PlantTemplate) {
        self.templates.write().await.insert(template.id.clone(), template);
    }

    /// Load a JSON array of templates; invalid ones are skipped
    pub async fn seed_templates(&self, path: &str) -> Result<usize, StoreError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Decode(format!("failed to read {}: {}", path, e)))?;
        let templates: Vec<PlantTemplate> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Decode(format!("failed to parse {}: {}", path, e)))?;

        let mut loaded = 0;
        for template in templates {
            if let Err(e) = template.validate() {
                tracing::warn!("Skipping template {}: {}", template.id, e);
                continue;
            }
            self.put_template(template).await;
            loaded += 1;
        }
        Ok(loaded)
    }

    #[cfg(test)]
    pub async fn set_user_plan(&self, user_id: &str, plan: UserPlan) {
        self.plans.write().await.insert(user_id.to_string(), plan);
    }

    /// Emitted notifications, oldest first
    #[cfg(test)]
    pub async fn notifications(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self.notifications.read().await.values().cloned().collect();
        all.sort_by_key(|n| n.created_at);
        all
    }
}

#[async_trait]
impl NotebookStore for MemoryStore {
    async fn get(&self, notebook_id: &str) -> Result<Option<Notebook>, StoreError> {
        Ok(self.notebooks.read().await.get(notebook_id).cloned())
    }

    async fn save(&self, notebook: &Notebook) -> Result<(), StoreError> {
        self.notebooks
            .write()
            .await
            .insert(notebook.id.clone(), notebook.clone());
        Ok(())
    }

    async fn delete(&self, notebook_id: &str) -> Result<(), StoreError> {
        self.notebooks.write().await.remove(notebook_id);
        Ok(())
    }

    async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<Notebook>, StoreError> {
        let mut notebooks: Vec<Notebook> = self
            .notebooks
            .read()
            .await
            .values()
            .filter(|n| n.user_id == user_id && n.is_active())
            .cloned()
            .collect();
        notebooks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notebooks)
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn get_template(&self, template_id: &str) -> Result<Option<PlantTemplate>, StoreError> {
        Ok(self.templates.read().await.get(template_id).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user_plan(&self, user_id: &str) -> Result<UserPlan, StoreError> {
        Ok(self
            .plans
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl NotificationSink for MemoryStore {
    async fn emit(&self, notification: &Notification) -> Result<(), StoreError> {
        self.notifications
            .write()
            .await
            .insert(notification.id.clone(), notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::template::fixtures::tomato_template;
    use crate::models::NotebookStatus;
    use chrono::Utc;

    #[tokio::test]
    async fn test_find_active_excludes_deleted_and_other_users() {
        let store = MemoryStore::new();
        let template = tomato_template();
        let now = Utc::now();

        let mine = Notebook::new("user-1", &template, "A", None, now.date_naive(), now);
        let mut deleted = Notebook::new("user-1", &template, "B", None, now.date_naive(), now);
        deleted.status = NotebookStatus::Deleted;
        let theirs = Notebook::new("user-2", &template, "C", None, now.date_naive(), now);

        for nb in [&mine, &deleted, &theirs] {
            store.save(nb).await.unwrap();
        }

        let active = store.find_active_by_user("user-1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, mine.id);
    }

    #[tokio::test]
    async fn test_seed_skips_invalid_templates() {
        let mut broken = tomato_template();
        broken.id = "tpl-broken".to_string();
        broken.stages[0].weight = 90.0;
        let path = std::env::temp_dir().join(format!("templates-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, serde_json::to_string(&vec![tomato_template(), broken]).unwrap()).unwrap();

        let store = MemoryStore::new();
        let loaded = store.seed_templates(path.to_str().unwrap()).await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, 1);
        assert!(store.get_template("tpl-tomato").await.unwrap().is_some());
        assert!(store.get_template("tpl-broken").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_plan_defaults_to_basic() {
        let store = MemoryStore::new();
        let plan = store.get_user_plan("nobody").await.unwrap();
        assert_eq!(plan, UserPlan::basic());
    }
}
