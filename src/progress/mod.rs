//! Notebook progress engine.
//!
//! Pure functions over a [`Notebook`](crate::models::Notebook) and its
//! [`PlantTemplate`](crate::models::PlantTemplate). Callers pass in today's local
//! date and the current instant; persistence and locking live in
//! `services::notebooks`.

pub mod checklist;
pub mod evaluator;
pub mod observations;
pub mod overdue;
pub mod rollover;
pub mod tasks;

pub use checklist::{build_daily_checklist, elapsed_days, ChecklistView};
pub use evaluator::StageTransition;
pub use observations::{record_observation, stage_observations, ObservationUpdate, StageObservations};
pub use overdue::{complete_overdue, find_overdue, skip_overdue, OverdueOutcome};
pub use rollover::roll_over;
pub use tasks::{toggle_task, TaskToggle};
