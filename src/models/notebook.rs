// Notebook models - a user's per-plant growing journal
// Path: notebooks/{notebook_id}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::template::{PlantTemplate, Task, TaskFrequency, TaskPriority};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotebookStatus {
    #[default]
    Active,
    Deleted,
}

impl NotebookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotebookStatus::Active => "active",
            NotebookStatus::Deleted => "deleted",
        }
    }
}

/// A boolean note about plant condition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub key: String,
    pub value: bool,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-stage record, created when the notebook enters the stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTracking {
    pub stage_number: u32,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Written once when the stage is finalized
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// All of today's tasks are done but the stage's last day is still ahead
    #[serde(default)]
    pub pending_transition: bool,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

impl StageTracking {
    pub fn new(stage_number: u32, started_at: DateTime<Utc>) -> Self {
        Self {
            stage_number,
            started_at: Some(started_at),
            completed_at: None,
            pending_transition: false,
            observations: vec![],
        }
    }

    pub fn observation(&self, key: &str) -> Option<&Observation> {
        self.observations.iter().find(|o| o.key == key)
    }
}

/// One actionable item of a day's checklist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChecklistItem {
    pub task_name: String,
    pub frequency: TaskFrequency,
    pub priority: TaskPriority,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    /// Set when an overdue day is skipped
    #[serde(default)]
    pub skipped: bool,
}

fn default_required() -> bool {
    true
}

impl ChecklistItem {
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_name: task.task_name.clone(),
            frequency: task.frequency,
            priority: task.priority,
            description: task.description.clone(),
            required: task.required,
            is_completed: false,
            completed_at: None,
            skipped: false,
        }
    }

    /// Neither done nor explicitly skipped
    pub fn is_outstanding(&self) -> bool {
        !self.is_completed && !self.skipped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverdueResolution {
    Skipped,
    Completed,
}

/// Archived checklist of a past day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyLog {
    pub date: NaiveDate,
    pub stage_number: u32,
    /// Elapsed days since planting on `date`
    pub day: u32,
    pub items: Vec<ChecklistItem>,
    #[serde(default)]
    pub resolution: Option<OverdueResolution>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl DailyLog {
    pub fn outstanding_items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.items.iter().filter(|i| i.is_outstanding())
    }

    /// Left incomplete and never resolved
    pub fn is_overdue(&self) -> bool {
        self.resolution.is_none() && self.outstanding_items().next().is_some()
    }

    pub fn all_completed(&self) -> bool {
        self.items.iter().all(|i| i.is_completed)
    }
}

/// A user's growing journal for one plant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notebook {
    pub id: String,
    pub user_id: String,
    pub template_id: String,
    pub notebook_name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Origin for day counting, in the platform's local calendar
    pub planted_date: NaiveDate,
    /// 1-based; `stages.len() + 1` once the notebook is completed
    pub current_stage: u32,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub stage_completion: f64,
    #[serde(default)]
    pub stages_tracking: Vec<StageTracking>,
    /// Today's checklist, only persisted once a task has been toggled
    #[serde(default)]
    pub daily_checklist: Vec<ChecklistItem>,
    /// Local day `daily_checklist` belongs to
    #[serde(default)]
    pub checklist_date: Option<NaiveDate>,
    /// Stage `daily_checklist` was built for; kept until rollover even if the stage advances
    #[serde(default)]
    pub checklist_stage: Option<u32>,
    #[serde(default)]
    pub daily_logs: Vec<DailyLog>,
    #[serde(default)]
    pub status: NotebookStatus,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notebook {
    /// Fresh notebook at stage 1 of `template`
    pub fn new(
        user_id: &str,
        template: &PlantTemplate,
        notebook_name: &str,
        description: Option<String>,
        planted_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            template_id: template.id.clone(),
            notebook_name: notebook_name.to_string(),
            description,
            planted_date,
            current_stage: 1,
            progress: 0.0,
            stage_completion: 0.0,
            stages_tracking: vec![StageTracking::new(1, now)],
            daily_checklist: vec![],
            checklist_date: None,
            checklist_stage: None,
            daily_logs: vec![],
            status: NotebookStatus::Active,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == NotebookStatus::Active
    }

    pub fn is_completed(&self, template: &PlantTemplate) -> bool {
        self.current_stage > template.stage_count()
    }

    pub fn tracking(&self, stage_number: u32) -> Option<&StageTracking> {
        self.stages_tracking.iter().find(|t| t.stage_number == stage_number)
    }

    /// Tracking for `stage_number`, created lazily
    pub fn tracking_mut(&mut self, stage_number: u32, now: DateTime<Utc>) -> &mut StageTracking {
        let idx = match self
            .stages_tracking
            .iter()
            .position(|t| t.stage_number == stage_number)
        {
            Some(idx) => idx,
            None => {
                self.stages_tracking.push(StageTracking::new(stage_number, now));
                self.stages_tracking.len() - 1
            }
        };
        &mut self.stages_tracking[idx]
    }

    pub fn log(&self, date: NaiveDate) -> Option<&DailyLog> {
        self.daily_logs.iter().find(|l| l.date == date)
    }

    pub fn log_mut(&mut self, date: NaiveDate) -> Option<&mut DailyLog> {
        self.daily_logs.iter_mut().find(|l| l.date == date)
    }
}

/// Past day that was left incomplete and unresolved
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverdueSummary {
    pub overdue_date: NaiveDate,
    pub overdue_count: usize,
    pub tasks: Vec<ChecklistItem>,
    /// Past days still waiting for skip/complete, including this one
    pub unresolved_days: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::template::fixtures::tomato_template;

    fn notebook() -> Notebook {
        let now = Utc::now();
        Notebook::new(
            "user-1",
            &tomato_template(),
            "Cà chua ban công",
            None,
            now.date_naive(),
            now,
        )
    }

    #[test]
    fn test_new_notebook_starts_at_stage_one() {
        let nb = notebook();
        assert_eq!(nb.current_stage, 1);
        assert_eq!(nb.progress, 0.0);
        assert_eq!(nb.stages_tracking.len(), 1);
        assert!(nb.is_active());
    }

    #[test]
    fn test_tracking_mut_creates_once() {
        let mut nb = notebook();
        let now = Utc::now();
        nb.tracking_mut(2, now).pending_transition = true;
        nb.tracking_mut(2, now);
        assert_eq!(nb.stages_tracking.len(), 2);
        assert!(nb.tracking(2).map(|t| t.pending_transition).unwrap_or(false));
    }

    #[test]
    fn test_skipped_items_are_not_overdue() {
        let mut item = ChecklistItem::from_task(&crate::models::template::fixtures::task("Tưới nước"));
        let mut log = DailyLog {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            stage_number: 1,
            day: 0,
            items: vec![item.clone()],
            resolution: None,
            resolved_at: None,
        };
        assert!(log.is_overdue());

        item.skipped = true;
        log.items = vec![item];
        assert!(!log.is_overdue());
    }

    #[test]
    fn test_notebook_json_roundtrip_keeps_defaults() {
        let json = serde_json::json!({
            "id": "nb-1",
            "user_id": "user-1",
            "template_id": "tpl-tomato",
            "notebook_name": "Rau muống",
            "planted_date": "2024-03-01",
            "current_stage": 2,
            "created_at": "2024-03-01T00:00:00Z",
            "updated_at": "2024-03-02T00:00:00Z"
        });
        let nb: Notebook = serde_json::from_value(json).unwrap();
        assert_eq!(nb.status, NotebookStatus::Active);
        assert!(nb.daily_logs.is_empty());
        assert_eq!(nb.current_stage, 2);
    }
}
