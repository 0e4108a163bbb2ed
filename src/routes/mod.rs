// Routes module

pub mod advice;
pub mod checklist;
pub mod daily;
pub mod health;
pub mod notebooks;
pub mod templates;

pub use advice::advice_routes;
pub use checklist::checklist_routes;
pub use daily::daily_routes;
pub use health::health_routes;
pub use notebooks::notebooks_routes;
pub use templates::templates_routes;
