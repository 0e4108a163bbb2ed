// Plant template models - admin-defined stage/task blueprint
// Path: plant_templates/{template_id}

use serde::{Deserialize, Serialize};

/// How often a task shows up in the daily checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskFrequency {
    #[default]
    Daily,
    Weekly,
    Once,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    #[default]
    Low,
    High,
}

/// A task listed under a template stage
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub task_name: String,
    #[serde(default)]
    pub frequency: TaskFrequency,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub description: Option<String>,
    /// Counts towards stage completion. Every listed task does unless marked otherwise.
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

/// One growing phase of a plant, spanning an inclusive day range
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    /// 1-based position in the template
    pub stage_number: u32,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// First day (0 = planting day)
    pub day_start: u32,
    /// Last day, inclusive
    pub day_end: u32,
    /// Contribution to overall progress (weights sum to 100)
    pub weight: f64,
    #[serde(default)]
    pub daily_tasks: Vec<Task>,
    #[serde(default)]
    pub observation_keys: Vec<String>,
}

impl Stage {
    /// Number of days the stage spans
    pub fn length_days(&self) -> u32 {
        self.day_end - self.day_start + 1
    }

    pub fn contains_day(&self, day: u32) -> bool {
        (self.day_start..=self.day_end).contains(&day)
    }

    pub fn task(&self, task_name: &str) -> Option<&Task> {
        self.daily_tasks.iter().find(|t| t.task_name == task_name)
    }
}

/// Template a notebook follows; immutable for the lifetime of a growing season
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlantTemplate {
    pub id: String,
    pub plant_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub stages: Vec<Stage>,
}

impl PlantTemplate {
    /// Stage by 1-based number
    pub fn stage(&self, stage_number: u32) -> Option<&Stage> {
        if stage_number == 0 {
            return None;
        }
        self.stages.get(stage_number as usize - 1)
    }

    pub fn stage_count(&self) -> u32 {
        self.stages.len() as u32
    }

    /// The stage whose day range contains `day`, if any
    pub fn stage_for_day(&self, day: u32) -> Option<&Stage> {
        self.stages.iter().find(|s| s.contains_day(day))
    }

    /// Last day covered by the template
    pub fn final_day(&self) -> u32 {
        self.stages.last().map(|s| s.day_end).unwrap_or(0)
    }

    /// Sum of the weights of every stage before `stage_number`
    pub fn weight_before(&self, stage_number: u32) -> f64 {
        self.stages
            .iter()
            .take_while(|s| s.stage_number < stage_number)
            .map(|s| s.weight)
            .sum()
    }

    /// Check the structural invariants the engine relies on
    pub fn validate(&self) -> Result<(), String> {
        if self.stages.is_empty() {
            return Err(format!("template {} has no stages", self.id));
        }

        let mut total_weight = 0.0;
        for (idx, stage) in self.stages.iter().enumerate() {
            let expected_number = idx as u32 + 1;
            if stage.stage_number != expected_number {
                return Err(format!(
                    "stage at position {} has number {}, expected {}",
                    idx, stage.stage_number, expected_number
                ));
            }
            if stage.day_start > stage.day_end {
                return Err(format!(
                    "stage {} starts on day {} after it ends on day {}",
                    stage.stage_number, stage.day_start, stage.day_end
                ));
            }
            if idx == 0 && stage.day_start != 0 {
                return Err(format!("first stage must start on day 0, got {}", stage.day_start));
            }
            if idx > 0 {
                let previous = &self.stages[idx - 1];
                if stage.day_start != previous.day_end + 1 {
                    return Err(format!(
                        "stage {} starts on day {}, expected {}",
                        stage.stage_number,
                        stage.day_start,
                        previous.day_end + 1
                    ));
                }
            }
            if !(0.0..=100.0).contains(&stage.weight) {
                return Err(format!("stage {} has weight {} outside 0-100", stage.stage_number, stage.weight));
            }
            for (task_idx, task) in stage.daily_tasks.iter().enumerate() {
                if stage.daily_tasks[..task_idx].iter().any(|t| t.task_name == task.task_name) {
                    return Err(format!(
                        "stage {} lists task '{}' twice",
                        stage.stage_number, task.task_name
                    ));
                }
            }
            total_weight += stage.weight;
        }

        if (total_weight - 100.0).abs() > 0.01 {
            return Err(format!("stage weights sum to {}, expected 100", total_weight));
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn task(name: &str) -> Task {
        Task {
            task_name: name.to_string(),
            frequency: TaskFrequency::Daily,
            priority: TaskPriority::High,
            description: None,
            required: true,
        }
    }

    /// Three stages: days 0-6 (30%), 7-20 (50%), 21-29 (20%)
    pub fn tomato_template() -> PlantTemplate {
        PlantTemplate {
            id: "tpl-tomato".to_string(),
            plant_name: "Cà chua".to_string(),
            description: None,
            stages: vec![
                Stage {
                    stage_number: 1,
                    name: "Nảy mầm".to_string(),
                    description: None,
                    day_start: 0,
                    day_end: 6,
                    weight: 30.0,
                    daily_tasks: vec![task("Tưới nước"), task("Kiểm tra độ ẩm")],
                    observation_keys: vec!["mam_nhu".to_string(), "la_mam".to_string()],
                },
                Stage {
                    stage_number: 2,
                    name: "Cây con".to_string(),
                    description: None,
                    day_start: 7,
                    day_end: 20,
                    weight: 50.0,
                    daily_tasks: vec![task("Tưới nước"), task("Bón phân")],
                    observation_keys: vec!["la_that".to_string()],
                },
                Stage {
                    stage_number: 3,
                    name: "Ra hoa".to_string(),
                    description: None,
                    day_start: 21,
                    day_end: 29,
                    weight: 20.0,
                    daily_tasks: vec![task("Tưới nước")],
                    observation_keys: vec![],
                },
            ],
        }
    }
}
