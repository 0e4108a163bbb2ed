// Models module

pub mod notebook;
pub mod notification;
pub mod request;
pub mod response;
pub mod template;
pub mod user;

pub use notebook::{
    ChecklistItem, DailyLog, Notebook, NotebookStatus, Observation, OverdueResolution,
    OverdueSummary,
};
pub use notification::{Notification, NotificationType};
pub use request::{
    AdviceRequest, CompleteOverdueBulkRequest, CompleteOverdueRequest, CompleteTaskRequest,
    CreateNotebookRequest, SkipOverdueRequest, UpdateNotebookRequest, UpdateObservationRequest,
};
pub use response::{ApiResponse, ChecklistResponse, DailyStatusResponse};
pub use template::{PlantTemplate, Stage, Task, TaskFrequency};
pub use user::UserPlan;
