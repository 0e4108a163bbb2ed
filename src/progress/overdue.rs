// Overdue reconciler
// Past days left incomplete surface once and stay resolved after skip/complete.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::evaluator::{evaluate_day, StageTransition};
use crate::error::AppError;
use crate::models::{Notebook, OverdueResolution, OverdueSummary, PlantTemplate};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverdueOutcome {
    pub date: NaiveDate,
    /// None while the day still has outstanding tasks
    pub resolution: Option<OverdueResolution>,
    pub affected_tasks: Vec<String>,
    pub progress: f64,
    pub current_stage: u32,
    pub transition: Option<StageTransition>,
}

/// Earliest past day that still needs skip or complete
pub fn find_overdue(notebook: &Notebook, today: NaiveDate) -> Option<OverdueSummary> {
    let mut unresolved = notebook
        .daily_logs
        .iter()
        .filter(|log| log.date < today && log.is_overdue());
    let earliest = unresolved.next()?;
    let unresolved_days = 1 + unresolved.count();

    let tasks: Vec<_> = earliest.outstanding_items().cloned().collect();
    Some(OverdueSummary {
        overdue_date: earliest.date,
        overdue_count: tasks.len(),
        tasks,
        unresolved_days,
    })
}

/// The day an overdue action applies to: the requested one or the earliest unresolved
fn target_date(
    notebook: &Notebook,
    date: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<NaiveDate, AppError> {
    let not_found = || AppError::NotFound("Không có công việc quá hạn cần xử lý".to_string());
    match date {
        Some(date) => {
            let log = notebook.log(date).filter(|l| l.date < today).ok_or_else(not_found)?;
            if !log.is_overdue() {
                return Err(not_found());
            }
            Ok(date)
        }
        None => find_overdue(notebook, today)
            .map(|s| s.overdue_date)
            .ok_or_else(not_found),
    }
}

/// Mark the outstanding tasks of an overdue day as skipped. Progress is left alone.
pub fn skip_overdue(
    notebook: &mut Notebook,
    date: Option<NaiveDate>,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<OverdueOutcome, AppError> {
    let date = target_date(notebook, date, today)?;
    let log = notebook.log_mut(date).ok_or_else(|| {
        AppError::NotFound(format!("Không tìm thấy nhật ký ngày {}", date))
    })?;

    let mut skipped = Vec::new();
    for item in log.items.iter_mut().filter(|i| i.is_outstanding()) {
        item.skipped = true;
        skipped.push(item.task_name.clone());
    }
    log.resolution = Some(OverdueResolution::Skipped);
    log.resolved_at = Some(now);
    notebook.updated_at = now;

    tracing::info!(
        "Skipped {} overdue tasks of {} for notebook {}",
        skipped.len(),
        date,
        notebook.id
    );

    Ok(OverdueOutcome {
        date,
        resolution: Some(OverdueResolution::Skipped),
        affected_tasks: skipped,
        progress: notebook.progress,
        current_stage: notebook.current_stage,
        transition: None,
    })
}

/// Complete named tasks of an overdue day, then re-evaluate that day so a stage whose
/// final day is settled late still advances.
pub fn complete_overdue(
    notebook: &mut Notebook,
    template: &PlantTemplate,
    task_names: &[String],
    date: Option<NaiveDate>,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<OverdueOutcome, AppError> {
    let task_names: Vec<&str> = task_names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();
    if task_names.is_empty() {
        return Err(AppError::Validation("Thiếu danh sách công việc (task_names)".to_string()));
    }

    let date = target_date(notebook, date, today)?;
    let log = notebook.log_mut(date).ok_or_else(|| {
        AppError::NotFound(format!("Không tìm thấy nhật ký ngày {}", date))
    })?;

    // Validate every name before touching anything
    if let Some(missing) = task_names
        .iter()
        .find(|name| !log.items.iter().any(|i| i.task_name == **name))
    {
        return Err(AppError::NotFound(format!(
            "Không tìm thấy công việc '{}' trong ngày {}",
            missing, date
        )));
    }

    let mut completed = Vec::new();
    for item in log
        .items
        .iter_mut()
        .filter(|i| task_names.contains(&i.task_name.as_str()))
    {
        if !item.is_completed {
            item.is_completed = true;
            item.skipped = false;
            item.completed_at = Some(now);
            completed.push(item.task_name.clone());
        }
    }

    let resolution = if log.outstanding_items().next().is_none() {
        log.resolution = Some(OverdueResolution::Completed);
        log.resolved_at = Some(now);
        Some(OverdueResolution::Completed)
    } else {
        None
    };
    notebook.updated_at = now;

    let transition = evaluate_day(notebook, template, date, now);

    tracing::info!(
        "Completed {} overdue tasks of {} for notebook {} (resolved: {})",
        completed.len(),
        date,
        notebook.id,
        resolution.is_some()
    );

    Ok(OverdueOutcome {
        date,
        resolution,
        affected_tasks: completed,
        progress: notebook.progress,
        current_stage: notebook.current_stage,
        transition,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::template::fixtures::tomato_template;
    use crate::progress::{roll_over, toggle_task};
    use chrono::{Duration, TimeZone};

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(n as i64)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 5, 0, 0).unwrap()
    }

    /// Notebook with a half-done checklist on `on`, rolled over to the next day
    fn with_overdue_day(template: &PlantTemplate, on: u32) -> Notebook {
        let mut nb = Notebook::new("user-1", template, "Ban công", None, day(0), now());
        toggle_task(&mut nb, template, "Tưới nước", day(on), now()).unwrap();
        roll_over(&mut nb, template, day(on + 1), now());
        nb
    }

    #[test]
    fn test_overdue_surfaces_incomplete_day() {
        let template = tomato_template();
        let nb = with_overdue_day(&template, 2);

        let summary = find_overdue(&nb, day(3)).expect("day 2 should be overdue");
        assert_eq!(summary.overdue_date, day(2));
        assert_eq!(summary.overdue_count, 1);
        assert_eq!(summary.tasks[0].task_name, "Kiểm tra độ ẩm");
        assert_eq!(summary.unresolved_days, 1);
    }

    #[test]
    fn test_skip_does_not_resurface_or_change_progress() {
        let template = tomato_template();
        let mut nb = with_overdue_day(&template, 2);
        let progress = nb.progress;

        let outcome = skip_overdue(&mut nb, None, day(3), now()).unwrap();
        assert_eq!(outcome.affected_tasks, vec!["Kiểm tra độ ẩm".to_string()]);
        assert_eq!(nb.progress, progress);
        assert!(find_overdue(&nb, day(3)).is_none());
        assert!(matches!(
            skip_overdue(&mut nb, None, day(3), now()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_complete_bulk_resolves_day() {
        let template = tomato_template();
        let mut nb = with_overdue_day(&template, 2);

        let outcome = complete_overdue(
            &mut nb,
            &template,
            &["Kiểm tra độ ẩm".to_string()],
            Some(day(2)),
            day(3),
            now(),
        )
        .unwrap();
        assert_eq!(outcome.resolution, Some(OverdueResolution::Completed));
        assert!(outcome.transition.is_none());
        assert!(find_overdue(&nb, day(3)).is_none());
    }

    #[test]
    fn test_completing_final_day_late_advances_stage() {
        let template = tomato_template();
        let mut nb = with_overdue_day(&template, 6);
        assert_eq!(nb.current_stage, 1);

        let outcome = complete_overdue(
            &mut nb,
            &template,
            &["Kiểm tra độ ẩm".to_string()],
            None,
            day(9),
            now(),
        )
        .unwrap();
        let transition = outcome.transition.expect("final day resolved late should advance");
        assert_eq!(transition.from_stage, 1);
        assert_eq!(nb.current_stage, 2);
        assert_eq!(nb.progress, 30.0);
    }

    #[test]
    fn test_unknown_task_leaves_day_untouched() {
        let template = tomato_template();
        let mut nb = with_overdue_day(&template, 2);

        let err = complete_overdue(
            &mut nb,
            &template,
            &["Kiểm tra độ ẩm".to_string(), "Hái quả".to_string()],
            None,
            day(3),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(find_overdue(&nb, day(3)).map(|s| s.overdue_count), Some(1));
    }

    #[test]
    fn test_partial_completion_keeps_day_open() {
        let mut template = tomato_template();
        template.stages[0]
            .daily_tasks
            .push(crate::models::template::fixtures::task("Che nắng"));
        let mut nb = with_overdue_day(&template, 2);

        let outcome = complete_overdue(
            &mut nb,
            &template,
            &["Che nắng".to_string()],
            None,
            day(3),
            now(),
        )
        .unwrap();
        assert!(outcome.resolution.is_none());
        assert_eq!(find_overdue(&nb, day(3)).map(|s| s.overdue_count), Some(1));
    }

    #[test]
    fn test_empty_task_list_is_validation_error() {
        let template = tomato_template();
        let mut nb = with_overdue_day(&template, 2);
        let err = complete_overdue(&mut nb, &template, &[], None, day(3), now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
