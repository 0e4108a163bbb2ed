// Completion / transition evaluator
//
// Every stage advance, whatever triggered it, goes through try_advance_stage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::checklist::{build_daily_checklist, elapsed_days};
use crate::error::AppError;
use crate::models::{ChecklistItem, Notebook, OverdueResolution, PlantTemplate};

/// What caused a stage to advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    /// Every task of the stage's last day was checked
    TasksCompleted,
    /// Every observation of the stage was recorded true
    ObservationsCompleted,
    /// The stage's last day was settled through the overdue flow
    OverdueResolved,
    /// Stage range elapsed and it lists no required task
    NoRequiredTasks,
    /// Calendar moved past the final stage
    TemplateFinished,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StageTransition {
    pub from_stage: u32,
    pub to_stage: u32,
    pub stage_name: String,
    pub trigger: TransitionTrigger,
    /// The notebook moved past its last stage
    pub notebook_completed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    Advanced(StageTransition),
    /// Current stage already moved past the evaluated one; nothing changed
    AlreadyAdvanced,
}

impl AdvanceOutcome {
    pub fn transition(self) -> Option<StageTransition> {
        match self {
            AdvanceOutcome::Advanced(t) => Some(t),
            AdvanceOutcome::AlreadyAdvanced => None,
        }
    }
}

/// Percentage of required items completed; 100 when nothing is required
pub fn completion_percentage(items: &[ChecklistItem]) -> f64 {
    let required: Vec<&ChecklistItem> = items.iter().filter(|i| i.required).collect();
    if required.is_empty() {
        return 100.0;
    }
    let done = required.iter().filter(|i| i.is_completed).count();
    (done as f64 / required.len() as f64) * 100.0
}

/// Advance from `expected_stage` to the next one.
///
/// Idempotent: racing triggers that evaluated the same stage advance it once.
pub fn try_advance_stage(
    notebook: &mut Notebook,
    template: &PlantTemplate,
    expected_stage: u32,
    trigger: TransitionTrigger,
    now: DateTime<Utc>,
) -> AdvanceOutcome {
    if notebook.current_stage != expected_stage || notebook.is_completed(template) {
        return AdvanceOutcome::AlreadyAdvanced;
    }

    let stage_name = template
        .stage(expected_stage)
        .map(|s| s.name.clone())
        .unwrap_or_default();

    let tracking = notebook.tracking_mut(expected_stage, now);
    if tracking.completed_at.is_none() {
        tracking.completed_at = Some(now);
    }
    tracking.pending_transition = false;

    notebook.current_stage = expected_stage + 1;
    notebook.stage_completion = 0.0;

    let notebook_completed = notebook.is_completed(template);
    if notebook_completed {
        notebook.progress = 100.0;
    } else {
        notebook.tracking_mut(notebook.current_stage, now);
        let completed_weight = template.weight_before(notebook.current_stage);
        notebook.progress = notebook.progress.max(completed_weight).min(100.0);
    }
    notebook.updated_at = now;

    tracing::info!(
        "Notebook {} advanced from stage {} to {} ({:?})",
        notebook.id,
        expected_stage,
        notebook.current_stage,
        trigger
    );

    AdvanceOutcome::Advanced(StageTransition {
        from_stage: expected_stage,
        to_stage: notebook.current_stage,
        stage_name,
        trigger,
        notebook_completed,
    })
}

/// Raise overall progress from completed stages plus partial credit for the current one.
///
/// Partial credit counts fully satisfied past days of the stage plus today's completion,
/// spread over the stage length. Progress never goes down.
pub fn recompute_progress(notebook: &mut Notebook, template: &PlantTemplate) {
    if notebook.is_completed(template) {
        notebook.progress = 100.0;
        return;
    }
    let Some(stage) = template.stage(notebook.current_stage) else {
        return;
    };

    let satisfied_days = notebook
        .daily_logs
        .iter()
        .filter(|log| log.stage_number == stage.stage_number)
        .filter(|log| log.all_completed() || log.resolution == Some(OverdueResolution::Completed))
        .count() as f64;
    let length = stage.length_days() as f64;
    let days_done = satisfied_days.min(length - 1.0).max(0.0);
    let partial = (stage.weight * (days_done + notebook.stage_completion / 100.0) / length)
        .min(stage.weight);

    let candidate = template.weight_before(stage.stage_number) + partial;
    notebook.progress = notebook.progress.max(candidate).min(100.0);
}

/// Re-evaluate today's checklist after a toggle.
///
/// Updates `stage_completion`, the pending flag, progress, and advances the stage when
/// today's list is fully done on or after the stage's last day.
pub fn evaluate_today(
    notebook: &mut Notebook,
    template: &PlantTemplate,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Option<StageTransition>, AppError> {
    let view = build_daily_checklist(notebook, template, today)?;
    let Some(stage_number) = view.stage_number() else {
        return Ok(None);
    };

    // Today's stored list belongs to a stage already left behind
    if stage_number != notebook.current_stage {
        notebook.stage_completion = 0.0;
        return Ok(None);
    }

    let items = view.items();
    notebook.stage_completion = completion_percentage(items);

    let all_done = !items.is_empty() && items.iter().all(|i| i.is_completed);
    let day = elapsed_days(notebook.planted_date, today);
    let last_day_reached = template
        .stage(stage_number)
        .map(|s| day >= s.day_end)
        .unwrap_or(false);

    notebook.tracking_mut(stage_number, now).pending_transition = all_done && !last_day_reached;
    recompute_progress(notebook, template);

    if all_done && last_day_reached {
        return Ok(try_advance_stage(
            notebook,
            template,
            stage_number,
            TransitionTrigger::TasksCompleted,
            now,
        )
        .transition());
    }
    Ok(None)
}

/// Re-evaluate an archived day after its overdue tasks were completed
pub fn evaluate_day(
    notebook: &mut Notebook,
    template: &PlantTemplate,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Option<StageTransition> {
    let (stage_number, day, all_done) = {
        let log = notebook.log(date)?;
        (log.stage_number, log.day, !log.items.is_empty() && log.all_completed())
    };
    if stage_number != notebook.current_stage {
        return None;
    }

    recompute_progress(notebook, template);

    let last_day = template.stage(stage_number)?.day_end;
    if all_done && day >= last_day {
        return try_advance_stage(
            notebook,
            template,
            stage_number,
            TransitionTrigger::OverdueResolved,
            now,
        )
        .transition();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::template::fixtures::{task, tomato_template};
    use crate::models::DailyLog;
    use chrono::{Duration, TimeZone};

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(n as i64)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap()
    }

    fn notebook(template: &PlantTemplate) -> Notebook {
        Notebook::new("user-1", template, "Ban công", None, day(0), now())
    }

    fn check_all(notebook: &mut Notebook, template: &PlantTemplate, today: NaiveDate) {
        let view = build_daily_checklist(notebook, template, today).unwrap();
        notebook.daily_checklist = view
            .items()
            .iter()
            .cloned()
            .map(|mut i| {
                i.is_completed = true;
                i
            })
            .collect();
        notebook.checklist_date = Some(today);
        notebook.checklist_stage = view.stage_number();
    }

    #[test]
    fn test_completion_percentage_counts_required_only() {
        let mut optional = ChecklistItem::from_task(&task("Ghi chú"));
        optional.required = false;
        let mut done = ChecklistItem::from_task(&task("Tưới nước"));
        done.is_completed = true;
        let pending = ChecklistItem::from_task(&task("Bón phân"));

        assert_eq!(completion_percentage(&[done.clone(), pending, optional.clone()]), 50.0);
        assert_eq!(completion_percentage(&[optional]), 100.0);
        assert_eq!(completion_percentage(&[]), 100.0);
    }

    #[test]
    fn test_all_done_before_last_day_stays_pending() {
        let template = tomato_template();
        let mut nb = notebook(&template);
        check_all(&mut nb, &template, day(0));

        let transition = evaluate_today(&mut nb, &template, day(0), now()).unwrap();
        assert!(transition.is_none());
        assert_eq!(nb.stage_completion, 100.0);
        assert_eq!(nb.current_stage, 1);
        assert!(nb.tracking(1).unwrap().pending_transition);
    }

    #[test]
    fn test_all_done_on_last_day_advances() {
        let template = tomato_template();
        let mut nb = notebook(&template);
        check_all(&mut nb, &template, day(6));

        let transition = evaluate_today(&mut nb, &template, day(6), now())
            .unwrap()
            .expect("stage should advance");
        assert_eq!(transition.from_stage, 1);
        assert_eq!(transition.to_stage, 2);
        assert_eq!(transition.trigger, TransitionTrigger::TasksCompleted);
        assert_eq!(nb.current_stage, 2);
        assert!(nb.tracking(1).unwrap().completed_at.is_some());
        assert!(nb.tracking(2).is_some());
        assert_eq!(nb.progress, 30.0);
    }

    #[test]
    fn test_double_advance_is_noop() {
        let template = tomato_template();
        let mut nb = notebook(&template);

        let first = try_advance_stage(&mut nb, &template, 1, TransitionTrigger::TasksCompleted, now());
        let completed_at = nb.tracking(1).unwrap().completed_at;
        let second = try_advance_stage(
            &mut nb,
            &template,
            1,
            TransitionTrigger::ObservationsCompleted,
            now() + Duration::minutes(1),
        );

        assert!(matches!(first, AdvanceOutcome::Advanced(_)));
        assert_eq!(second, AdvanceOutcome::AlreadyAdvanced);
        assert_eq!(nb.current_stage, 2);
        assert_eq!(nb.tracking(1).unwrap().completed_at, completed_at);
    }

    #[test]
    fn test_advancing_last_stage_completes_notebook() {
        let template = tomato_template();
        let mut nb = notebook(&template);
        for stage in 1..=3 {
            try_advance_stage(&mut nb, &template, stage, TransitionTrigger::TasksCompleted, now());
        }
        assert_eq!(nb.current_stage, 4);
        assert_eq!(nb.progress, 100.0);
        assert_eq!(
            try_advance_stage(&mut nb, &template, 4, TransitionTrigger::TasksCompleted, now()),
            AdvanceOutcome::AlreadyAdvanced
        );
    }

    #[test]
    fn test_progress_never_decreases() {
        let template = tomato_template();
        let mut nb = notebook(&template);
        check_all(&mut nb, &template, day(3));
        evaluate_today(&mut nb, &template, day(3), now()).unwrap();
        let high = nb.progress;
        assert!(high > 0.0);

        nb.daily_checklist[0].is_completed = false;
        evaluate_today(&mut nb, &template, day(3), now()).unwrap();
        assert_eq!(nb.stage_completion, 50.0);
        assert_eq!(nb.progress, high);
    }

    #[test]
    fn test_partial_credit_counts_satisfied_days() {
        let template = tomato_template();
        let mut nb = notebook(&template);
        let mut items: Vec<ChecklistItem> = template.stages[0]
            .daily_tasks
            .iter()
            .map(ChecklistItem::from_task)
            .collect();
        for item in items.iter_mut() {
            item.is_completed = true;
        }
        for n in 0..3 {
            nb.daily_logs.push(DailyLog {
                date: day(n),
                stage_number: 1,
                day: n,
                items: items.clone(),
                resolution: None,
                resolved_at: None,
            });
        }

        recompute_progress(&mut nb, &template);
        let expected = 30.0 * 3.0 / 7.0;
        assert!((nb.progress - expected).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_day_advances_on_resolved_final_day() {
        let template = tomato_template();
        let mut nb = notebook(&template);
        let mut items: Vec<ChecklistItem> = template.stages[0]
            .daily_tasks
            .iter()
            .map(ChecklistItem::from_task)
            .collect();
        for item in items.iter_mut() {
            item.is_completed = true;
        }
        nb.daily_logs.push(DailyLog {
            date: day(6),
            stage_number: 1,
            day: 6,
            items,
            resolution: Some(OverdueResolution::Completed),
            resolved_at: Some(now()),
        });

        let transition = evaluate_day(&mut nb, &template, day(6), now()).expect("should advance");
        assert_eq!(transition.trigger, TransitionTrigger::OverdueResolved);
        assert_eq!(nb.current_stage, 2);
    }
}
