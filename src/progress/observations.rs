// Observation recorder
// Observations are side records: they never feed stage_completion or progress.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::evaluator::{try_advance_stage, StageTransition, TransitionTrigger};
use crate::error::AppError;
use crate::models::{Notebook, Observation, PlantTemplate};

/// One observation key of the current stage and its recorded value
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ObservationEntry {
    pub key: String,
    /// None until recorded
    pub value: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StageObservations {
    pub stage_number: u32,
    pub stage_name: String,
    pub observations: Vec<ObservationEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ObservationUpdate {
    pub observation: Observation,
    pub stage_number: u32,
    pub transition: Option<StageTransition>,
}

impl ObservationUpdate {
    pub fn auto_transitioned(&self) -> bool {
        self.transition.is_some()
    }
}

/// Observation keys of the current stage with whatever has been recorded
pub fn stage_observations(
    notebook: &Notebook,
    template: &PlantTemplate,
) -> Result<StageObservations, AppError> {
    // A completed notebook reports its final stage
    let stage_number = notebook.current_stage.min(template.stage_count());
    let stage = template
        .stage(stage_number)
        .ok_or_else(|| AppError::NotFound(format!("Không tìm thấy giai đoạn {}", stage_number)))?;
    let tracking = notebook.tracking(stage_number);

    let observations = stage
        .observation_keys
        .iter()
        .map(|key| {
            let recorded = tracking.and_then(|t| t.observation(key));
            ObservationEntry {
                key: key.clone(),
                value: recorded.map(|o| o.value),
                updated_at: recorded.and_then(|o| o.updated_at),
            }
        })
        .collect();

    Ok(StageObservations {
        stage_number,
        stage_name: stage.name.clone(),
        observations,
    })
}

/// Upsert an observation on the stage that lists `key`, up to the current one.
///
/// When every key of the stage is recorded true the stage advances through the same
/// idempotent entry point the task evaluator uses. A stage already left stays put.
pub fn record_observation(
    notebook: &mut Notebook,
    template: &PlantTemplate,
    key: &str,
    value: bool,
    now: DateTime<Utc>,
) -> Result<ObservationUpdate, AppError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(AppError::Validation("Thiếu mã quan sát (observation_key)".to_string()));
    }
    if notebook.is_completed(template) {
        return Err(AppError::Validation("Sổ tay đã hoàn thành, không thể cập nhật quan sát".to_string()));
    }

    let current = template.stage(notebook.current_stage).ok_or_else(|| {
        AppError::NotFound(format!("Không tìm thấy giai đoạn {}", notebook.current_stage))
    })?;
    // Current stage first; a key of a stage already left is recorded there
    let stage = template
        .stages
        .iter()
        .rev()
        .filter(|s| s.stage_number <= current.stage_number)
        .find(|s| s.observation_keys.iter().any(|k| k == key))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Quan sát '{}' không thuộc giai đoạn {}",
                key, current.name
            ))
        })?;
    let stage_number = stage.stage_number;
    let keys = stage.observation_keys.clone();

    let observation = Observation {
        key: key.to_string(),
        value,
        updated_at: Some(now),
    };
    let tracking = notebook.tracking_mut(stage_number, now);
    match tracking.observations.iter_mut().find(|o| o.key == key) {
        Some(existing) => *existing = observation.clone(),
        None => tracking.observations.push(observation.clone()),
    }
    let all_observed = keys
        .iter()
        .all(|k| tracking.observation(k).map(|o| o.value).unwrap_or(false));
    notebook.updated_at = now;

    let transition = if all_observed {
        try_advance_stage(
            notebook,
            template,
            stage_number,
            TransitionTrigger::ObservationsCompleted,
            now,
        )
        .transition()
    } else {
        None
    };

    Ok(ObservationUpdate {
        observation,
        stage_number,
        transition,
    })
}
