// Notebook service - runs the progress engine against the stores
// Every mutation is load -> roll over -> engine -> save under a per-notebook lock.

use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::firestore::document_id_from_seed;
use super::store::{NotebookStore, NotificationSink, TemplateStore, UserStore};
use crate::clock::Clock;
use crate::error::AppError;
use crate::models::{
    ChecklistResponse, CreateNotebookRequest, DailyStatusResponse, Notebook, NotebookStatus,
    Notification, NotificationType, PlantTemplate, UpdateNotebookRequest,
};
use crate::progress::{
    build_daily_checklist, complete_overdue, elapsed_days, find_overdue,
    record_observation, roll_over, skip_overdue, stage_observations, toggle_task, ObservationUpdate,
    OverdueOutcome, StageObservations, StageTransition, TaskToggle,
};

pub struct NotebookService {
    notebooks: Arc<dyn NotebookStore>,
    templates: Arc<dyn TemplateStore>,
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    /// Active notebooks allowed on the basic plan
    free_tier_limit: usize,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

/// Exclusive hold on one key of the lock table; the entry goes away with its last holder
struct KeyLock<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl NotebookService {
    pub fn new(
        notebooks: Arc<dyn NotebookStore>,
        templates: Arc<dyn TemplateStore>,
        users: Arc<dyn UserStore>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        free_tier_limit: usize,
    ) -> Self {
        Self {
            notebooks,
            templates,
            users,
            notifier,
            clock,
            free_tier_limit,
            locks: DashMap::new(),
        }
    }

    async fn acquire(&self, key: &str) -> KeyLock<'_> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        KeyLock {
            locks: &self.locks,
            key: key.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    /// Notebook owned by `user_id`; other users' notebooks do not exist for them
    async fn load_owned(
        &self,
        user_id: &str,
        notebook_id: &str,
        include_deleted: bool,
    ) -> Result<Notebook, AppError> {
        self.notebooks
            .get(notebook_id)
            .await?
            .filter(|nb| nb.user_id == user_id)
            .filter(|nb| include_deleted || nb.is_active())
            .ok_or_else(|| AppError::NotFound(format!("Không tìm thấy sổ tay {}", notebook_id)))
    }

    pub async fn load_template(&self, template_id: &str) -> Result<PlantTemplate, AppError> {
        let template = self
            .templates
            .get_template(template_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Không tìm thấy mẫu cây trồng {}", template_id)))?;
        template.validate().map_err(|e| {
            tracing::error!("Template {} is invalid: {}", template_id, e);
            AppError::Validation(format!("Mẫu cây trồng {} không hợp lệ", template_id))
        })?;
        Ok(template)
    }

    /// Basic-plan users may hold at most `free_tier_limit` active notebooks
    async fn ensure_capacity(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), AppError> {
        let plan = self.users.get_user_plan(user_id).await?;
        if !plan.is_free_tier(now) {
            return Ok(());
        }
        let current_count = self.notebooks.find_active_by_user(user_id).await?.len();
        if current_count >= self.free_tier_limit {
            tracing::info!(
                "User {} hit the free tier cap ({}/{})",
                user_id,
                current_count,
                self.free_tier_limit
            );
            return Err(AppError::LimitExceeded {
                current_count,
                max_allowed: self.free_tier_limit,
            });
        }
        Ok(())
    }

    /// Run `op` on the rolled-over notebook and persist the result.
    ///
    /// Engine operations validate before mutating, so a rejected op still saves the rollover.
    async fn mutate<R, F>(&self, user_id: &str, notebook_id: &str, op: F) -> Result<R, AppError>
    where
        F: FnOnce(
            &mut Notebook,
            &PlantTemplate,
            NaiveDate,
            DateTime<Utc>,
        ) -> Result<(R, Option<StageTransition>), AppError>,
    {
        let _guard = self.acquire(notebook_id).await;

        let mut notebook = self.load_owned(user_id, notebook_id, false).await?;
        let template = self.load_template(&notebook.template_id).await?;
        let today = self.clock.today();
        let now = self.clock.now();

        let rolled = roll_over(&mut notebook, &template, today, now);
        let mut transitions = rolled.transitions;

        match op(&mut notebook, &template, today, now) {
            Ok((value, transition)) => {
                transitions.extend(transition);
                self.notebooks.save(&notebook).await?;
                self.announce_transitions(&notebook, &transitions, now).await;
                Ok(value)
            }
            Err(e) => {
                if rolled.changed {
                    self.notebooks.save(&notebook).await?;
                    self.announce_transitions(&notebook, &transitions, now).await;
                }
                Err(e)
            }
        }
    }

    /// Rolled-over copy of the notebook; nothing is written
    async fn view(&self, user_id: &str, notebook_id: &str) -> Result<(Notebook, PlantTemplate), AppError> {
        let mut notebook = self.load_owned(user_id, notebook_id, false).await?;
        let template = self.load_template(&notebook.template_id).await?;
        roll_over(&mut notebook, &template, self.clock.today(), self.clock.now());
        Ok((notebook, template))
    }

    async fn notify(&self, notification: Notification) {
        if let Err(e) = self.notifier.emit(&notification).await {
            tracing::warn!(
                "Failed to emit {} notification for notebook {}: {}",
                notification.notification_type.as_str(),
                notification.notebook_id,
                e
            );
        }
    }

    async fn announce_transitions(
        &self,
        notebook: &Notebook,
        transitions: &[StageTransition],
        now: DateTime<Utc>,
    ) {
        for transition in transitions {
            let message = if transition.notebook_completed {
                format!(
                    "Chúc mừng! Sổ tay '{}' đã hoàn thành tất cả các giai đoạn.",
                    notebook.notebook_name
                )
            } else {
                format!(
                    "Sổ tay '{}' đã hoàn thành giai đoạn {} ({}) và chuyển sang giai đoạn {}.",
                    notebook.notebook_name,
                    transition.from_stage,
                    transition.stage_name,
                    transition.to_stage
                )
            };
            self.notify(notification(
                notebook,
                NotificationType::StageCompleted,
                &transition.from_stage.to_string(),
                message,
                now,
            ))
            .await;
        }
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    pub async fn create_notebook(
        &self,
        user_id: &str,
        request: CreateNotebookRequest,
    ) -> Result<Notebook, AppError> {
        let template_id = request
            .template_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation("Thiếu mẫu cây trồng (template_id)".to_string()))?;
        let notebook_name = request
            .notebook_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation("Thiếu tên sổ tay (notebook_name)".to_string()))?;

        let today = self.clock.today();
        let now = self.clock.now();
        let planted_date = request.planted_date.unwrap_or(today);
        if planted_date > today {
            return Err(AppError::Validation("Ngày gieo trồng không được ở tương lai".to_string()));
        }

        let template = self.load_template(template_id).await?;

        let _guard = self.acquire(&format!("user:{}", user_id)).await;
        self.ensure_capacity(user_id, now).await?;

        let mut notebook = Notebook::new(
            user_id,
            &template,
            notebook_name,
            request.description,
            planted_date,
            now,
        );
        // Back-dated notebooks catch up on stages that need no tasks
        let rolled = roll_over(&mut notebook, &template, today, now);
        self.notebooks.save(&notebook).await?;
        self.announce_transitions(&notebook, &rolled.transitions, now).await;

        tracing::info!(
            "Created notebook {} ({}) for user {} planted {}",
            notebook.id,
            template.plant_name,
            user_id,
            planted_date
        );
        Ok(notebook)
    }

    pub async fn list_notebooks(&self, user_id: &str) -> Result<Vec<Notebook>, AppError> {
        Ok(self.notebooks.find_active_by_user(user_id).await?)
    }

    pub async fn get_notebook(&self, user_id: &str, notebook_id: &str) -> Result<Notebook, AppError> {
        let (notebook, _) = self.view(user_id, notebook_id).await?;
        Ok(notebook)
    }

    pub async fn update_notebook(
        &self,
        user_id: &str,
        notebook_id: &str,
        request: UpdateNotebookRequest,
    ) -> Result<Notebook, AppError> {
        self.mutate(user_id, notebook_id, |notebook, _, _, now| {
            if let Some(name) = request.notebook_name.as_deref() {
                let name = name.trim();
                if name.is_empty() {
                    return Err(AppError::Validation("Tên sổ tay không được để trống".to_string()));
                }
                notebook.notebook_name = name.to_string();
            }
            if let Some(description) = request.description {
                notebook.description = Some(description);
            }
            notebook.updated_at = now;
            Ok((notebook.clone(), None))
        })
        .await
    }

    /// Soft delete: the notebook disappears from listings until restored
    pub async fn delete_notebook(&self, user_id: &str, notebook_id: &str) -> Result<(), AppError> {
        let _guard = self.acquire(notebook_id).await;

        let mut notebook = self.load_owned(user_id, notebook_id, false).await?;
        let now = self.clock.now();
        notebook.status = NotebookStatus::Deleted;
        notebook.deleted_at = Some(now);
        notebook.updated_at = now;
        self.notebooks.save(&notebook).await?;

        tracing::info!("Soft deleted notebook {} for user {}", notebook_id, user_id);
        Ok(())
    }

    pub async fn restore_notebook(&self, user_id: &str, notebook_id: &str) -> Result<Notebook, AppError> {
        let _user_guard = self.acquire(&format!("user:{}", user_id)).await;
        let _guard = self.acquire(notebook_id).await;

        let mut notebook = self.load_owned(user_id, notebook_id, true).await?;
        if notebook.is_active() {
            return Err(AppError::Validation("Sổ tay chưa bị xóa".to_string()));
        }

        let now = self.clock.now();
        self.ensure_capacity(user_id, now).await?;

        notebook.status = NotebookStatus::Active;
        notebook.deleted_at = None;
        notebook.updated_at = now;
        self.notebooks.save(&notebook).await?;

        tracing::info!("Restored notebook {} for user {}", notebook_id, user_id);
        Ok(notebook)
    }

    /// Hard delete, active or soft-deleted
    pub async fn purge_notebook(&self, user_id: &str, notebook_id: &str) -> Result<(), AppError> {
        let _guard = self.acquire(notebook_id).await;

        self.load_owned(user_id, notebook_id, true).await?;
        self.notebooks.delete(notebook_id).await?;

        tracing::info!("Permanently deleted notebook {} for user {}", notebook_id, user_id);
        Ok(())
    }

    // =========================================================================
    // DAILY CHECKLIST AND OBSERVATIONS
    // =========================================================================

    pub async fn get_daily_checklist(
        &self,
        user_id: &str,
        notebook_id: &str,
    ) -> Result<ChecklistResponse, AppError> {
        let (notebook, template) = self.view(user_id, notebook_id).await?;
        checklist_response(&notebook, &template, self.clock.today())
    }

    pub async fn complete_task(
        &self,
        user_id: &str,
        notebook_id: &str,
        task_name: &str,
    ) -> Result<TaskToggle, AppError> {
        self.mutate(user_id, notebook_id, |notebook, template, today, now| {
            let toggle = toggle_task(notebook, template, task_name, today, now)?;
            let transition = toggle.transition.clone();
            Ok((toggle, transition))
        })
        .await
    }

    pub async fn get_observations(
        &self,
        user_id: &str,
        notebook_id: &str,
    ) -> Result<StageObservations, AppError> {
        let (notebook, template) = self.view(user_id, notebook_id).await?;
        stage_observations(&notebook, &template)
    }

    pub async fn update_observation(
        &self,
        user_id: &str,
        notebook_id: &str,
        key: &str,
        value: bool,
    ) -> Result<ObservationUpdate, AppError> {
        self.mutate(user_id, notebook_id, |notebook, template, _, now| {
            let update = record_observation(notebook, template, key, value, now)?;
            let transition = update.transition.clone();
            Ok((update, transition))
        })
        .await
    }

    // =========================================================================
    // DAILY STATUS AND OVERDUE
    // =========================================================================

    /// Today's checklist plus the earliest unresolved past day.
    ///
    /// Persists the rollover and raises reminder notifications.
    pub async fn get_daily_status(
        &self,
        user_id: &str,
        notebook_id: &str,
    ) -> Result<DailyStatusResponse, AppError> {
        let _guard = self.acquire(notebook_id).await;

        let mut notebook = self.load_owned(user_id, notebook_id, false).await?;
        let template = self.load_template(&notebook.template_id).await?;
        let today = self.clock.today();
        let now = self.clock.now();

        let rolled = roll_over(&mut notebook, &template, today, now);
        if rolled.changed {
            self.notebooks.save(&notebook).await?;
            self.announce_transitions(&notebook, &rolled.transitions, now).await;
        }

        let overdue = find_overdue(&notebook, today);
        if let Some(summary) = &overdue {
            self.notify(notification(
                &notebook,
                NotificationType::StageReminder,
                &summary.overdue_date.to_string(),
                format!(
                    "Sổ tay '{}' còn {} công việc chưa hoàn thành ngày {}.",
                    notebook.notebook_name,
                    summary.overdue_count,
                    summary.overdue_date.format("%d/%m/%Y")
                ),
                now,
            ))
            .await;
        }

        if let Some(stage) = lagging_stage(&notebook, &template, today) {
            self.notify(notification(
                &notebook,
                NotificationType::StageOverdue,
                &stage.0.to_string(),
                format!(
                    "Giai đoạn {} ({}) của sổ tay '{}' đã quá thời hạn nhưng chưa hoàn thành.",
                    stage.0, stage.1, notebook.notebook_name
                ),
                now,
            ))
            .await;
        }

        Ok(DailyStatusResponse {
            today: checklist_response(&notebook, &template, today)?,
            has_overdue: overdue.is_some(),
            overdue,
        })
    }

    pub async fn skip_overdue_tasks(
        &self,
        user_id: &str,
        notebook_id: &str,
        date: Option<NaiveDate>,
    ) -> Result<OverdueOutcome, AppError> {
        self.mutate(user_id, notebook_id, |notebook, _, today, now| {
            Ok((skip_overdue(notebook, date, today, now)?, None))
        })
        .await
    }

    pub async fn complete_overdue_task(
        &self,
        user_id: &str,
        notebook_id: &str,
        task_name: &str,
        date: Option<NaiveDate>,
    ) -> Result<OverdueOutcome, AppError> {
        self.complete_overdue_tasks_bulk(user_id, notebook_id, &[task_name.to_string()], date)
            .await
    }

    pub async fn complete_overdue_tasks_bulk(
        &self,
        user_id: &str,
        notebook_id: &str,
        task_names: &[String],
        date: Option<NaiveDate>,
    ) -> Result<OverdueOutcome, AppError> {
        self.mutate(user_id, notebook_id, |notebook, template, today, now| {
            let outcome = complete_overdue(notebook, template, task_names, date, today, now)?;
            let transition = outcome.transition.clone();
            Ok((outcome, transition))
        })
        .await
    }

    /// Notebook and template as the advisor should see them today
    pub async fn advice_context(
        &self,
        user_id: &str,
        notebook_id: &str,
    ) -> Result<(Notebook, PlantTemplate), AppError> {
        self.view(user_id, notebook_id).await
    }
}

fn checklist_response(
    notebook: &Notebook,
    template: &PlantTemplate,
    today: NaiveDate,
) -> Result<ChecklistResponse, AppError> {
    let checklist = build_daily_checklist(notebook, template, today)?;
    // A list kept from a stage left today says nothing about the current one
    let stage_completion = if checklist.stage_number() == Some(notebook.current_stage) {
        notebook.stage_completion
    } else {
        0.0
    };
    Ok(ChecklistResponse {
        notebook_id: notebook.id.clone(),
        date: today,
        current_stage: notebook.current_stage,
        stage_completion,
        progress: notebook.progress,
        notebook_completed: notebook.is_completed(template),
        checklist,
    })
}

/// Current stage whose day range is already behind, as (number, name)
fn lagging_stage(notebook: &Notebook, template: &PlantTemplate, today: NaiveDate) -> Option<(u32, String)> {
    let stage = template.stage(notebook.current_stage)?;
    (elapsed_days(notebook.planted_date, today) > stage.day_end)
        .then(|| (stage.stage_number, stage.name.clone()))
}

/// Notification whose id is derived from the event, so re-emitting overwrites it
fn notification(
    notebook: &Notebook,
    notification_type: NotificationType,
    event_key: &str,
    message: String,
    now: DateTime<Utc>,
) -> Notification {
    let seed = format!("{}:{}:{}", notebook.id, notification_type.as_str(), event_key);
    Notification {
        id: document_id_from_seed(&seed),
        user_id: notebook.user_id.clone(),
        notification_type,
        notebook_id: notebook.id.clone(),
        message,
        read: false,
        created_at: now,
    }
}
