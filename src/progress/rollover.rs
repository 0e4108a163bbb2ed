// Lazy daily rollover, run at the start of every notebook operation.
// There is no background timer: the wall-clock day decides.

use chrono::{DateTime, NaiveDate, Utc};

use super::checklist::{elapsed_days, has_required_tasks_on};
use super::evaluator::{try_advance_stage, AdvanceOutcome, StageTransition, TransitionTrigger};
use crate::models::{DailyLog, Notebook, PlantTemplate};

#[derive(Debug, Default)]
pub struct Rollover {
    /// The notebook was modified and should be saved
    pub changed: bool,
    pub transitions: Vec<StageTransition>,
}

/// Archive yesterday's checklist, finalize an expired notebook and skip through
/// elapsed stages that have nothing to check off.
pub fn roll_over(
    notebook: &mut Notebook,
    template: &PlantTemplate,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Rollover {
    let mut result = Rollover::default();

    if let Some(date) = notebook.checklist_date.filter(|d| *d < today) {
        let items = std::mem::take(&mut notebook.daily_checklist);
        if !items.is_empty() {
            let stage_number = notebook.checklist_stage.unwrap_or(notebook.current_stage);
            let day = elapsed_days(notebook.planted_date, date);
            let log = DailyLog {
                date,
                stage_number,
                day,
                items,
                resolution: None,
                resolved_at: None,
            };
            match notebook.daily_logs.iter().position(|l| l.date == date) {
                Some(idx) => notebook.daily_logs[idx] = log,
                None => notebook.daily_logs.push(log),
            }
            notebook.daily_logs.sort_by_key(|l| l.date);
            tracing::debug!("Archived checklist of {} for notebook {}", date, notebook.id);
        }
        notebook.checklist_date = None;
        notebook.checklist_stage = None;
        notebook.stage_completion = 0.0;
        let current = notebook.current_stage;
        if let Some(tracking) = notebook
            .stages_tracking
            .iter_mut()
            .find(|t| t.stage_number == current)
        {
            tracking.pending_transition = false;
        }
        result.changed = true;
    }

    let day = elapsed_days(notebook.planted_date, today);

    // Calendar ran past the template: treat the notebook as complete
    if day > template.final_day() {
        while !notebook.is_completed(template) {
            let stage = notebook.current_stage;
            match try_advance_stage(notebook, template, stage, TransitionTrigger::TemplateFinished, now) {
                AdvanceOutcome::Advanced(t) => result.transitions.push(t),
                AdvanceOutcome::AlreadyAdvanced => break,
            }
        }
    }

    // An elapsed stage whose last day has nothing required can never be checked off
    while let Some(stage) = template.stage(notebook.current_stage) {
        if day <= stage.day_end {
            break;
        }
        let trigger = if stage.daily_tasks.iter().all(|t| !t.required) {
            TransitionTrigger::NoRequiredTasks
        } else if !has_required_tasks_on(stage, stage.day_end, &notebook.daily_logs) {
            // once tasks already done, or weekly tasks off the last day
            TransitionTrigger::TasksCompleted
        } else {
            break;
        };
        let stage_number = stage.stage_number;
        match try_advance_stage(notebook, template, stage_number, trigger, now) {
            AdvanceOutcome::Advanced(t) => result.transitions.push(t),
            AdvanceOutcome::AlreadyAdvanced => break,
        }
    }

    if !result.transitions.is_empty() {
        result.changed = true;
    }
    if notebook.is_completed(template) && notebook.progress < 100.0 {
        notebook.progress = 100.0;
        result.changed = true;
    }

    result
}
