// Configuration - Environment variables

use chrono_tz::Tz;
use std::env;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Ho_Chi_Minh;
pub const DEFAULT_FREE_TIER_LIMIT: usize = 3;

/// Application configuration loaded from environment
#[derive(Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Firestore project; without it notebooks live in memory
    pub firestore_project_id: Option<String>,
    /// Google Application Credentials path for Firestore
    pub google_application_credentials: Option<String>,
    /// HS256 secret for bearer tokens
    pub jwt_secret: String,
    /// Calendar used for day counting
    pub timezone: Tz,
    /// APP_TIMEZONE value that failed to parse
    pub invalid_timezone: Option<String>,
    /// Active notebooks allowed on the basic plan
    pub free_tier_notebook_limit: usize,
    /// Gemini API key for the advisor
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub log_file: String,
    /// JSON array of plant templates loaded into the in-memory store
    pub template_seed_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let timezone_name = env::var("APP_TIMEZONE").ok();
        let timezone = timezone_name.as_deref().and_then(|tz| tz.parse::<Tz>().ok());

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            firestore_project_id: env::var("FIRESTORE_PROJECT_ID").ok()
                .or_else(|| env::var("GCP_PROJECT_ID").ok())
                .filter(|p| !p.is_empty()),
            google_application_credentials: env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
            jwt_secret: env::var("JWT_SECRET").unwrap_or_default(),
            timezone: timezone.unwrap_or(DEFAULT_TIMEZONE),
            invalid_timezone: timezone_name.filter(|_| timezone.is_none()),
            free_tier_notebook_limit: env::var("FREE_TIER_NOTEBOOK_LIMIT")
                .ok()
                .and_then(|n| n.parse().ok())
                .unwrap_or(DEFAULT_FREE_TIER_LIMIT),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            gemini_model: env::var("GEMINI_MODEL").ok(),
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "/tmp/garden-notebook.log".to_string()),
            template_seed_file: env::var("TEMPLATE_SEED_FILE").ok(),
        }
    }

    /// Validate that required configuration is present
    pub fn validate(&self) -> Result<(), String> {
        if self.jwt_secret.is_empty() {
            return Err("JWT_SECRET not set - every authenticated request will be rejected".to_string());
        }
        if let Some(tz) = &self.invalid_timezone {
            return Err(format!("APP_TIMEZONE '{}' is not a known timezone, using {}", tz, self.timezone));
        }
        if self.free_tier_notebook_limit == 0 {
            return Err("FREE_TIER_NOTEBOOK_LIMIT must be at least 1".to_string());
        }
        if self.firestore_project_id.is_none() {
            tracing::warn!("FIRESTORE_PROJECT_ID not set - notebooks are kept in memory only");
            if self.template_seed_file.is_none() {
                tracing::warn!("TEMPLATE_SEED_FILE not set - no plant templates will be available");
            }
        } else if self.google_application_credentials.is_none() {
            tracing::warn!("GOOGLE_APPLICATION_CREDENTIALS not set - Firestore will use default credentials");
        }
        if self.gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY not set - advice requests will fail");
        }
        Ok(())
    }
}

#[cfg(test)]
impl Config {
    /// In-memory setup with a fixed secret
    pub(crate) fn for_tests() -> Self {
        Config {
            port: 8080,
            firestore_project_id: None,
            google_application_credentials: None,
            jwt_secret: "secret".to_string(),
            timezone: DEFAULT_TIMEZONE,
            invalid_timezone: None,
            free_tier_notebook_limit: DEFAULT_FREE_TIER_LIMIT,
            gemini_api_key: None,
            gemini_model: None,
            log_file: "/tmp/garden-notebook.log".to_string(),
            template_seed_file: None,
        }
    }
}
