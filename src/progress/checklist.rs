// Daily checklist builder
// Derives today's task list from the notebook's current stage

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::AppError;
use crate::models::{ChecklistItem, DailyLog, Notebook, PlantTemplate, Stage, Task, TaskFrequency};

/// Whole local days since planting; never negative
pub fn elapsed_days(planted_date: NaiveDate, today: NaiveDate) -> u32 {
    (today - planted_date).num_days().max(0) as u32
}

/// Today's checklist, or the terminal state once the template is exhausted
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ChecklistView {
    Active {
        stage_number: u32,
        stage_name: String,
        /// Elapsed days since planting
        day: u32,
        /// 1-based day shown to the user
        day_number: u32,
        /// Stage whose day range contains today
        expected_stage: Option<u32>,
        items: Vec<ChecklistItem>,
    },
    Completed,
}

impl ChecklistView {
    pub fn items(&self) -> &[ChecklistItem] {
        match self {
            ChecklistView::Active { items, .. } => items,
            ChecklistView::Completed => &[],
        }
    }

    pub fn stage_number(&self) -> Option<u32> {
        match self {
            ChecklistView::Active { stage_number, .. } => Some(*stage_number),
            ChecklistView::Completed => None,
        }
    }
}

/// Past the last stage, either by advancing or by the calendar
pub fn is_past_template(notebook: &Notebook, template: &PlantTemplate, today: NaiveDate) -> bool {
    notebook.is_completed(template)
        || elapsed_days(notebook.planted_date, today) > template.final_day()
}

/// Build today's checklist. Pure: nothing is persisted here.
pub fn build_daily_checklist(
    notebook: &Notebook,
    template: &PlantTemplate,
    today: NaiveDate,
) -> Result<ChecklistView, AppError> {
    if is_past_template(notebook, template, today) {
        return Ok(ChecklistView::Completed);
    }

    let day = elapsed_days(notebook.planted_date, today);
    let expected_stage = template.stage_for_day(day).map(|s| s.stage_number);
    let stored_today = notebook.checklist_date == Some(today) && !notebook.daily_checklist.is_empty();

    // A checklist stored today keeps its stage until rollover
    let stage_number = match notebook.checklist_stage {
        Some(stage) if stored_today => stage,
        _ => notebook.current_stage,
    };
    let stage = template.stage(stage_number).ok_or_else(|| {
        AppError::Validation(format!(
            "Giai đoạn {} không tồn tại trong mẫu cây trồng",
            stage_number
        ))
    })?;

    let items = if stored_today && stage_number != notebook.current_stage {
        notebook.daily_checklist.clone()
    } else {
        stage
            .daily_tasks
            .iter()
            .filter(|task| task_applies(task, stage, day, &notebook.daily_logs))
            .map(|task| {
                let mut item = ChecklistItem::from_task(task);
                if stored_today {
                    if let Some(stored) = notebook
                        .daily_checklist
                        .iter()
                        .find(|i| i.task_name == task.task_name)
                    {
                        item.is_completed = stored.is_completed;
                        item.completed_at = stored.completed_at;
                    }
                }
                item
            })
            .collect()
    };

    Ok(ChecklistView::Active {
        stage_number,
        stage_name: stage.name.clone(),
        day,
        day_number: day + 1,
        expected_stage,
        items,
    })
}

/// Whether any required task of `stage` is due on `day`
pub fn has_required_tasks_on(stage: &Stage, day: u32, logs: &[DailyLog]) -> bool {
    stage
        .daily_tasks
        .iter()
        .any(|task| task.required && task_applies(task, stage, day, logs))
}

/// Whether `task` belongs on the checklist of `day`
fn task_applies(task: &Task, stage: &Stage, day: u32, logs: &[DailyLog]) -> bool {
    match task.frequency {
        TaskFrequency::Daily => true,
        TaskFrequency::Weekly => day.abs_diff(stage.day_start) % 7 == 0,
        // Shown every day of the stage until done once
        TaskFrequency::Once => !logs.iter().any(|log| {
            log.stage_number == stage.stage_number
                && log
                    .items
                    .iter()
                    .any(|i| i.task_name == task.task_name && i.is_completed)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::template::fixtures::{task, tomato_template};
    use chrono::{Duration, TimeZone, Utc};

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(n as i64)
    }

    fn notebook(template: &PlantTemplate) -> Notebook {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap();
        Notebook::new("user-1", template, "Ban công", None, day(0), now)
    }

    #[test]
    fn test_elapsed_days_never_negative() {
        assert_eq!(elapsed_days(day(3), day(0)), 0);
        assert_eq!(elapsed_days(day(0), day(0)), 0);
        assert_eq!(elapsed_days(day(0), day(6)), 6);
    }

    #[test]
    fn test_planted_today_gets_stage_one_tasks() {
        let template = tomato_template();
        let nb = notebook(&template);

        let view = build_daily_checklist(&nb, &template, day(0)).unwrap();
        match view {
            ChecklistView::Active {
                stage_number,
                day_number,
                items,
                ..
            } => {
                assert_eq!(stage_number, 1);
                assert_eq!(day_number, 1);
                assert_eq!(items.len(), 2);
                assert!(items.iter().all(|i| !i.is_completed));
            }
            ChecklistView::Completed => panic!("expected active checklist"),
        }
    }

    #[test]
    fn test_past_last_stage_is_completed() {
        let template = tomato_template();
        let nb = notebook(&template);
        let view = build_daily_checklist(&nb, &template, day(30)).unwrap();
        assert_eq!(view, ChecklistView::Completed);
    }

    #[test]
    fn test_completed_items_preserved_for_today_only() {
        let template = tomato_template();
        let mut nb = notebook(&template);
        let mut items: Vec<ChecklistItem> = template.stages[0]
            .daily_tasks
            .iter()
            .map(ChecklistItem::from_task)
            .collect();
        items[0].is_completed = true;
        nb.daily_checklist = items;
        nb.checklist_date = Some(day(2));
        nb.checklist_stage = Some(1);

        let today = build_daily_checklist(&nb, &template, day(2)).unwrap();
        assert!(today.items()[0].is_completed);
        assert!(!today.items()[1].is_completed);

        let tomorrow = build_daily_checklist(&nb, &template, day(3)).unwrap();
        assert!(tomorrow.items().iter().all(|i| !i.is_completed));
    }

    #[test]
    fn test_weekly_task_only_on_stage_week_boundaries() {
        let mut template = tomato_template();
        let mut weekly = task("Tỉa lá");
        weekly.frequency = TaskFrequency::Weekly;
        template.stages[1].daily_tasks.push(weekly);
        let mut nb = notebook(&template);
        nb.current_stage = 2;

        let on_boundary = build_daily_checklist(&nb, &template, day(14)).unwrap();
        assert!(on_boundary.items().iter().any(|i| i.task_name == "Tỉa lá"));

        let off_boundary = build_daily_checklist(&nb, &template, day(15)).unwrap();
        assert!(!off_boundary.items().iter().any(|i| i.task_name == "Tỉa lá"));
    }

    #[test]
    fn test_once_task_disappears_after_completion() {
        let mut template = tomato_template();
        let mut once = task("Làm giàn");
        once.frequency = TaskFrequency::Once;
        template.stages[0].daily_tasks.push(once.clone());
        let mut nb = notebook(&template);

        let first = build_daily_checklist(&nb, &template, day(1)).unwrap();
        assert_eq!(first.items().len(), 3);

        let mut done = ChecklistItem::from_task(&once);
        done.is_completed = true;
        nb.daily_logs.push(DailyLog {
            date: day(1),
            stage_number: 1,
            day: 1,
            items: vec![done],
            resolution: None,
            resolved_at: None,
        });

        let later = build_daily_checklist(&nb, &template, day(2)).unwrap();
        assert!(!later.items().iter().any(|i| i.task_name == "Làm giàn"));
    }

    #[test]
    fn test_required_tasks_on_day() {
        let mut template = tomato_template();
        let mut weekly = task("Tỉa lá");
        weekly.frequency = TaskFrequency::Weekly;
        template.stages[1].daily_tasks = vec![weekly];
        let stage = &template.stages[1];

        assert!(has_required_tasks_on(stage, 14, &[]));
        assert!(!has_required_tasks_on(stage, 20, &[]));
        assert!(has_required_tasks_on(&template.stages[0], 6, &[]));
    }

    #[test]
    fn test_lagging_notebook_reports_expected_stage() {
        let template = tomato_template();
        let nb = notebook(&template);
        match build_daily_checklist(&nb, &template, day(8)).unwrap() {
            ChecklistView::Active {
                stage_number,
                expected_stage,
                ..
            } => {
                assert_eq!(stage_number, 1);
                assert_eq!(expected_stage, Some(2));
            }
            ChecklistView::Completed => panic!("expected active checklist"),
        }
    }
}
