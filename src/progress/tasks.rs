// Task completion toggle for today's checklist

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::checklist::{build_daily_checklist, ChecklistView};
use super::evaluator::{evaluate_today, StageTransition};
use crate::error::AppError;
use crate::models::{Notebook, PlantTemplate};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskToggle {
    pub task_name: String,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub stage_completion: f64,
    pub progress: f64,
    pub current_stage: u32,
    pub transition: Option<StageTransition>,
}

/// Flip one task of today's checklist, persist the list on the notebook and re-evaluate.
///
/// Toggling twice restores the original state.
pub fn toggle_task(
    notebook: &mut Notebook,
    template: &PlantTemplate,
    task_name: &str,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<TaskToggle, AppError> {
    let task_name = task_name.trim();
    if task_name.is_empty() {
        return Err(AppError::Validation("Thiếu tên công việc (task_name)".to_string()));
    }

    let (stage_number, mut items) = match build_daily_checklist(notebook, template, today)? {
        ChecklistView::Completed => {
            return Err(AppError::Validation("Sổ tay đã hoàn thành, không còn công việc hằng ngày".to_string()));
        }
        ChecklistView::Active {
            stage_number, items, ..
        } => (stage_number, items),
    };

    let item = items
        .iter_mut()
        .find(|i| i.task_name == task_name)
        .ok_or_else(|| {
            AppError::NotFound(format!("Không tìm thấy công việc '{}' trong danh sách hôm nay", task_name))
        })?;

    item.is_completed = !item.is_completed;
    item.completed_at = if item.is_completed { Some(now) } else { None };
    let is_completed = item.is_completed;
    let completed_at = item.completed_at;

    notebook.daily_checklist = items;
    notebook.checklist_date = Some(today);
    notebook.checklist_stage = Some(stage_number);
    notebook.updated_at = now;

    let transition = evaluate_today(notebook, template, today, now)?;

    Ok(TaskToggle {
        task_name: task_name.to_string(),
        is_completed,
        completed_at,
        stage_completion: notebook.stage_completion,
        progress: notebook.progress,
        current_stage: notebook.current_stage,
        transition,
    })
}
