// Garden Notebook Backend - Rust
// Progress engine for plant-growing journals

use axum::Router;
use std::fs::OpenOptions;
use std::io::LineWriter;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};
use std::fmt::Write as FmtWrite;

/// Custom time formatter: [HH:mm:ss] [notebook]
#[derive(Clone)]
struct BackendTimer;

impl FormatTime for BackendTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(w, "[{}] [notebook]", now.format("%H:%M:%S"))
    }
}

mod auth;
mod clock;
mod config;
mod error;
mod llm;
mod models;
mod progress;
mod routes;
mod services;

use clock::{Clock, SystemClock};
use config::Config;
use llm::GeminiClient;
use routes::{
    advice_routes, checklist_routes, daily_routes, health_routes, notebooks_routes,
    templates_routes,
};
use services::{
    FirestoreService, MemoryStore, NotebookService, NotebookStore, NotificationSink,
    TemplateStore, UserStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub notebooks: Arc<NotebookService>,
    pub advisor: Arc<GeminiClient>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
}

/// The four collaborators, usually backed by one store
struct Backends {
    notebooks: Arc<dyn NotebookStore>,
    templates: Arc<dyn TemplateStore>,
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn NotificationSink>,
}

impl Backends {
    fn shared<S>(store: Arc<S>) -> Self
    where
        S: NotebookStore + TemplateStore + UserStore + NotificationSink + 'static,
    {
        Self {
            notebooks: store.clone(),
            templates: store.clone(),
            users: store.clone(),
            notifier: store,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Wrap in LineWriter to flush after each line (ensures logs appear immediately)
    let file_writer = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
    {
        Ok(file) => Some(tracing_appender::non_blocking(LineWriter::new(file))),
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", config.log_file, e);
            None
        }
    };
    let (file_writer, _guard) = match file_writer {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    // Initialize tracing with both stdout and file output
    // Format: [HH:mm:ss] [notebook] message
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "garden_notebook=info,tower_http=info".into()),
        )
        // Stdout layer
        .with(
            fmt::layer()
                .with_timer(BackendTimer)
                .with_target(false)
                .with_level(false)
                .with_ansi(true)
        )
        // File layer (same format, no ANSI colors)
        .with(file_writer.map(|writer| {
            fmt::layer()
                .with_timer(BackendTimer)
                .with_target(false)
                .with_level(false)
                .with_ansi(false)
                .with_writer(writer)
        }))
        .init();

    if let Err(e) = config.validate() {
        tracing::error!("Configuration error: {}", e);
    }

    // Firestore when a project is configured, in-process store otherwise
    let backends = match &config.firestore_project_id {
        Some(project_id) => {
            match FirestoreService::new(
                project_id.clone(),
                config.google_application_credentials.as_deref(),
            )
            .await
            {
                Ok(fs) => {
                    tracing::info!("Using Firestore project {}", project_id);
                    Backends::shared(Arc::new(fs))
                }
                Err(e) => {
                    tracing::error!("Failed to initialize Firestore: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            tracing::warn!("Using in-memory store - data is lost on restart");
            let store = Arc::new(MemoryStore::new());
            if let Some(path) = &config.template_seed_file {
                match store.seed_templates(path).await {
                    Ok(count) => tracing::info!("Seeded {} plant templates from {}", count, path),
                    Err(e) => tracing::error!("Failed to seed templates: {}", e),
                }
            }
            Backends::shared(store)
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.timezone));
    tracing::info!(
        "Day counting in {} (today is {})",
        config.timezone,
        clock.today()
    );

    let notebooks = Arc::new(NotebookService::new(
        backends.notebooks,
        backends.templates,
        backends.users,
        backends.notifier,
        clock.clone(),
        config.free_tier_notebook_limit,
    ));

    let advisor = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    ));
    if !advisor.is_configured() {
        tracing::warn!("Plant-care advisor disabled");
    }

    // Create app state
    let state = AppState {
        notebooks,
        advisor,
        clock,
        config: Arc::new(config.clone()),
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(health_routes())
        .merge(notebooks_routes())
        .merge(checklist_routes())
        .merge(daily_routes())
        .merge(advice_routes())
        .merge(templates_routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting Garden Notebook Backend on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
    }
}
