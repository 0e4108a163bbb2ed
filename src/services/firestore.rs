// Firestore service - document store for notebooks, templates, users and notifications
// Uses the Firestore REST API directly

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::{NotebookStore, NotificationSink, StoreError, TemplateStore, UserStore};
use crate::models::{Notebook, NotebookStatus, Notification, PlantTemplate, UserPlan};

/// Service account credentials from JSON file
#[derive(Debug, Clone, Deserialize)]
struct ServiceAccountCredentials {
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

/// JWT claims for Google OAuth2
#[derive(Debug, Serialize)]
struct GoogleJwtClaims {
    iss: String,   // Service account email
    scope: String, // OAuth scopes
    aud: String,   // Token endpoint
    iat: i64,      // Issued at
    exp: i64,      // Expiration
}

/// Cached access token with expiration
struct CachedToken {
    token: String,
    expires_at: i64,
}

/// Firestore collection paths
pub const NOTEBOOKS_COLLECTION: &str = "notebooks";
pub const TEMPLATES_COLLECTION: &str = "plant_templates";
pub const USERS_COLLECTION: &str = "users";
pub const NOTIFICATIONS_COLLECTION: &str = "notifications";

/// Generate a document ID from a seed string using SHA256 hash
pub fn document_id_from_seed(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..10]) // First 20 hex chars (10 bytes)
}

/// Firestore REST API client
pub struct FirestoreService {
    client: Client,
    project_id: String,
    credentials: Option<ServiceAccountCredentials>,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl FirestoreService {
    /// Create a new Firestore service
    pub async fn new(project_id: String, credentials_path: Option<&str>) -> Result<Self, StoreError> {
        let client = Client::new();
        let credentials = Self::load_credentials(credentials_path)?;

        let service = Self {
            client,
            project_id,
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
        };

        // Pre-fetch an access token
        if let Err(e) = service.get_access_token().await {
            tracing::warn!("Failed to get initial access token: {}", e);
        }

        Ok(service)
    }

    /// Load service account credentials from JSON file
    fn load_credentials(path: Option<&str>) -> Result<Option<ServiceAccountCredentials>, StoreError> {
        let creds_path = match path {
            Some(path) => path.to_string(),
            None => {
                // Try default location in current directory
                if std::path::Path::new("google-credentials.json").exists() {
                    "google-credentials.json".to_string()
                } else {
                    tracing::warn!("No credentials path configured and no google-credentials.json found");
                    return Ok(None);
                }
            }
        };

        tracing::info!("Loading service account credentials from: {}", creds_path);

        let creds_json = std::fs::read_to_string(&creds_path).map_err(|e| {
            StoreError::Auth(format!("Failed to read credentials file {}: {}", creds_path, e))
        })?;

        let credentials: ServiceAccountCredentials = serde_json::from_str(&creds_json)
            .map_err(|e| StoreError::Auth(format!("Failed to parse credentials JSON: {}", e)))?;

        tracing::info!("Loaded credentials for service account: {}", credentials.client_email);

        Ok(Some(credentials))
    }

    /// Get access token, using cache if valid or refreshing if needed
    async fn get_access_token(&self) -> Result<String, StoreError> {
        {
            let cache = self.cached_token.read().await;
            if let Some(cached) = cache.as_ref() {
                let now = Utc::now().timestamp();
                // Use token if it has at least 60 seconds left
                if cached.expires_at > now + 60 {
                    return Ok(cached.token.clone());
                }
            }
        }

        let token = self.fetch_new_access_token().await?;

        // Tokens are valid for 1 hour, refresh after 55 minutes
        {
            let mut cache = self.cached_token.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at: Utc::now().timestamp() + 3300,
            });
        }

        Ok(token)
    }

    /// Fetch a new access token from Google OAuth
    async fn fetch_new_access_token(&self) -> Result<String, StoreError> {
        if let Some(creds) = &self.credentials {
            let token = self.get_token_from_service_account(creds).await?;
            tracing::info!("Got access token from service account");
            return Ok(token);
        }

        // Fall back to metadata server (Cloud Run / GKE without a credentials file)
        if let Ok(token) = self.try_metadata_server().await {
            tracing::info!("Got access token from GCP metadata server");
            return Ok(token);
        }

        Err(StoreError::Auth(
            "No valid authentication method available. Set GOOGLE_APPLICATION_CREDENTIALS or run on GCP."
                .to_string(),
        ))
    }

    /// Try to get token from GCP metadata server
    async fn try_metadata_server(&self) -> Result<String, StoreError> {
        let metadata_url =
            "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

        let response = self
            .client
            .get(metadata_url)
            .header("Metadata-Flavor", "Google")
            .timeout(std::time::Duration::from_secs(2))
            .send()
            .await?;

        if response.status().is_success() {
            #[derive(Deserialize)]
            struct TokenResponse {
                access_token: String,
            }
            let token: TokenResponse = response.json().await?;
            return Ok(token.access_token);
        }

        Err(StoreError::Auth("Metadata server not available".to_string()))
    }

    /// Get access token using service account credentials (OAuth2 JWT flow)
    async fn get_token_from_service_account(
        &self,
        creds: &ServiceAccountCredentials,
    ) -> Result<String, StoreError> {
        let now = Utc::now().timestamp();
        let token_uri = creds
            .token_uri
            .as_deref()
            .unwrap_or("https://oauth2.googleapis.com/token");

        let claims = GoogleJwtClaims {
            iss: creds.client_email.clone(),
            scope: "https://www.googleapis.com/auth/datastore".to_string(),
            aud: token_uri.to_string(),
            iat: now,
            exp: now + 3600,
        };

        // Sign JWT with service account private key (RS256)
        let key = EncodingKey::from_rsa_pem(creds.private_key.as_bytes())
            .map_err(|e| StoreError::Auth(format!("Failed to parse private key: {}", e)))?;

        let jwt = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| StoreError::Auth(format!("Failed to encode JWT: {}", e)))?;

        let response = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!("Token exchange failed: {}", error_text)));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(token_response.access_token)
    }

    /// Build Firestore REST API base URL
    fn base_url(&self) -> String {
        format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/(default)/documents",
            self.project_id
        )
    }

    /// Build request with auth header
    async fn build_request(
        &self,
        method: reqwest::Method,
        url: &str,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        let token = self.get_access_token().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    // =========================================================================
    // DOCUMENTS
    // =========================================================================

    /// GET a document; None on 404
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let url = format!("{}/{}/{}", self.base_url(), collection, id);

        let response = self
            .build_request(reqwest::Method::GET, &url)
            .await?
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(StoreError::Firestore { status, body });
        }

        Ok(Some(response.json().await?))
    }

    /// PATCH a whole document (creates it when missing)
    async fn write_document<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let url = format!("{}/{}/{}", self.base_url(), collection, id);
        let json = serde_json::to_value(value).map_err(|e| StoreError::Decode(e.to_string()))?;
        let doc = to_document(&json);

        let response = self
            .build_request(reqwest::Method::PATCH, &url)
            .await?
            .json(&doc)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(StoreError::Firestore { status, body });
        }
        Ok(())
    }
}

#[async_trait]
impl NotebookStore for FirestoreService {
    async fn get(&self, notebook_id: &str) -> Result<Option<Notebook>, StoreError> {
        match self.get_document(NOTEBOOKS_COLLECTION, notebook_id).await? {
            Some(doc) => Ok(Some(parse_document(&doc)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, notebook: &Notebook) -> Result<(), StoreError> {
        self.write_document(NOTEBOOKS_COLLECTION, &notebook.id, notebook)
            .await?;
        tracing::info!("Saved notebook {} for user {}", notebook.id, notebook.user_id);
        Ok(())
    }

    async fn delete(&self, notebook_id: &str) -> Result<(), StoreError> {
        let url = format!("{}/{}/{}", self.base_url(), NOTEBOOKS_COLLECTION, notebook_id);

        let response = self
            .build_request(reqwest::Method::DELETE, &url)
            .await?
            .send()
            .await?;

        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            let status = response.status().as_u16();
            let body = response.text().await?;
            return Err(StoreError::Firestore { status, body });
        }

        tracing::info!("Deleted notebook {}", notebook_id);
        Ok(())
    }

    async fn find_active_by_user(&self, user_id: &str) -> Result<Vec<Notebook>, StoreError> {
        let query = json!({
            "structuredQuery": {
                "from": [{"collectionId": NOTEBOOKS_COLLECTION}],
                "where": {
                    "compositeFilter": {
                        "op": "AND",
                        "filters": [
                            {
                                "fieldFilter": {
                                    "field": {"fieldPath": "user_id"},
                                    "op": "EQUAL",
                                    "value": {"stringValue": user_id}
                                }
                            },
                            {
                                "fieldFilter": {
                                    "field": {"fieldPath": "status"},
                                    "op": "EQUAL",
                                    "value": {"stringValue": NotebookStatus::Active.as_str()}
                                }
                            }
                        ]
                    }
                }
            }
        });

        let response = self
            .build_request(reqwest::Method::POST, &format!("{}:runQuery", self.base_url()))
            .await?
            .json(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await?;
            tracing::error!("Firestore query error: {}", body);
            return Err(StoreError::Firestore { status, body });
        }

        let results: Vec<Value> = response.json().await?;
        let mut notebooks: Vec<Notebook> = results
            .into_iter()
            .filter_map(|row| {
                row.get("document").and_then(|d| match parse_document::<Notebook>(d) {
                    Ok(nb) => Some(nb),
                    Err(e) => {
                        tracing::warn!("Failed to parse notebook: {}", e);
                        None
                    }
                })
            })
            .collect();
        notebooks.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        tracing::info!("Retrieved {} active notebooks for user {}", notebooks.len(), user_id);
        Ok(notebooks)
    }
}

#[async_trait]
impl TemplateStore for FirestoreService {
    async fn get_template(&self, template_id: &str) -> Result<Option<PlantTemplate>, StoreError> {
        match self.get_document(TEMPLATES_COLLECTION, template_id).await? {
            Some(doc) => {
                let mut fields = decode_fields(&doc);
                // Admin-created templates carry their id only in the document name
                if fields.get("id").is_none() {
                    fields["id"] = json!(template_id);
                }
                serde_json::from_value(fields).map(Some).map_err(|e| {
                    StoreError::Decode(format!("template {}: {}", template_id, e))
                })
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserStore for FirestoreService {
    async fn get_user_plan(&self, user_id: &str) -> Result<UserPlan, StoreError> {
        let Some(doc) = self.get_document(USERS_COLLECTION, user_id).await? else {
            return Ok(UserPlan::basic());
        };
        let fields = decode_fields(&doc);
        match fields.get("subscription") {
            Some(subscription) if !subscription.is_null() => {
                serde_json::from_value(subscription.clone()).map_err(|e| {
                    StoreError::Decode(format!("subscription of {}: {}", user_id, e))
                })
            }
            _ => Ok(UserPlan::basic()),
        }
    }
}

#[async_trait]
impl NotificationSink for FirestoreService {
    async fn emit(&self, notification: &Notification) -> Result<(), StoreError> {
        self.write_document(NOTIFICATIONS_COLLECTION, &notification.id, notification)
            .await?;
        tracing::info!(
            "Stored {} notification {} for user {}",
            notification.notification_type.as_str(),
            notification.id,
            notification.user_id
        );
        Ok(())
    }
}

// =========================================================================
// VALUE ENCODING
// =========================================================================

/// Wrap a JSON object as a Firestore document body
fn to_document(json: &Value) -> Value {
    match to_firestore_value(json) {
        Value::Object(mut wrapped) => match wrapped.remove("mapValue") {
            Some(map) => map,
            None => json!({"fields": {}}),
        },
        _ => json!({"fields": {}}),
    }
}

/// Plain JSON -> Firestore typed value
fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => json!({"booleanValue": b}),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({"integerValue": i.to_string()})
            } else {
                json!({"doubleValue": n.as_f64().unwrap_or(0.0)})
            }
        }
        Value::String(s) => json!({"stringValue": s}),
        Value::Array(items) => json!({
            "arrayValue": {"values": items.iter().map(to_firestore_value).collect::<Vec<_>>()}
        }),
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), to_firestore_value(v)))
                .collect();
            json!({"mapValue": {"fields": fields}})
        }
    }
}

/// Firestore typed value -> plain JSON
fn from_firestore_value(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    if let Some(b) = obj.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = obj.get("integerValue") {
        // Firestore sends 64-bit integers as strings
        return i
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or_else(|| i.clone());
    }
    if let Some(d) = obj.get("doubleValue") {
        return d.clone();
    }
    if let Some(s) = obj.get("stringValue").or_else(|| obj.get("timestampValue")) {
        return s.clone();
    }
    if let Some(array) = obj.get("arrayValue") {
        let values = array
            .get("values")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().map(from_firestore_value).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    if let Some(map) = obj.get("mapValue") {
        return decode_fields(map);
    }
    Value::Null
}

/// `{"fields": {...}}` of a document or map value -> plain JSON object
fn decode_fields(doc: &Value) -> Value {
    let fields = doc
        .get("fields")
        .and_then(|f| f.as_object())
        .map(|f| {
            f.iter()
                .map(|(k, v)| (k.clone(), from_firestore_value(v)))
                .collect::<Map<String, Value>>()
        })
        .unwrap_or_default();
    Value::Object(fields)
}

fn parse_document<T: DeserializeOwned>(doc: &Value) -> Result<T, StoreError> {
    let name = doc.get("name").and_then(|n| n.as_str()).unwrap_or("<unnamed>");
    serde_json::from_value(decode_fields(doc))
        .map_err(|e| StoreError::Decode(format!("{}: {}", name, e)))
}
