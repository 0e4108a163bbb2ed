// Gemini client for plant-care advice

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use chrono::NaiveDate;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use super::prompts::{advice_prompt, ADVICE_SYSTEM_PROMPT};
use crate::error::AppError;
use crate::models::{Notebook, PlantTemplate};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("json error: {0}")]
    Serde(String),
    #[error("GEMINI_API_KEY is not configured")]
    MissingApiKey,
    #[error("response contained no text")]
    EmptyResponse,
}

impl LlmError {
    /// Only rate limiting is worth waiting out
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::RateLimited)
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::RateLimited => 429,
            Self::Http { status, .. } => *status,
            Self::MissingApiKey => 503,
            Self::Transport(_) | Self::Serde(_) | Self::EmptyResponse => 502,
        }
    }
}

impl From<LlmError> for AppError {
    fn from(e: LlmError) -> Self {
        AppError::Upstream {
            status: e.status(),
            message: e.to_string(),
        }
    }
}

/// Care advice for the notebook's current stage
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Advice {
    Structured {
        summary: String,
        tips: Vec<String>,
        warnings: Vec<String>,
    },
    /// The model answered, but not in the requested JSON shape
    RawText { text: String },
}

#[derive(Deserialize)]
struct StructuredAdvice {
    summary: String,
    #[serde(default)]
    tips: Vec<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Delays between attempts: 1.2s, 1.8s, 2.7s
pub fn retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(1200))
        .with_factor(1.5)
        .with_max_times(3)
}

pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    model: String,
}

impl GeminiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    pub fn new(api_key: Option<String>, model: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });
        Self {
            http,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask for care tips for the notebook's current stage
    pub async fn advise(
        &self,
        notebook: &Notebook,
        template: &PlantTemplate,
        today: NaiveDate,
        question: Option<&str>,
    ) -> Result<Advice, AppError> {
        let prompt = advice_prompt(notebook, template, today, question);
        let text = self.generate(&prompt).await?;
        Ok(parse_advice(&text))
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        (|| async { self.send_request(api_key, prompt).await })
            .retry(retry_policy())
            .when(|e: &LlmError| e.should_retry())
            .notify(|e, dur| {
                tracing::warn!(
                    "Gemini call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn send_request(&self, api_key: &str, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);
        let body = json!({
            "systemInstruction": {"parts": [{"text": ADVICE_SYSTEM_PROMPT}]},
            "contents": [{"role": "user", "parts": [{"text": prompt}]}],
            "generationConfig": {
                "temperature": 0.4,
                "responseMimeType": "application/json"
            }
        });

        let res = self
            .http
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        match res.status() {
            s if s.is_success() => {
                let parsed: GenerateResponse = res
                    .json()
                    .await
                    .map_err(|e| LlmError::Serde(e.to_string()))?;
                parsed
                    .candidates
                    .into_iter()
                    .filter_map(|c| c.content)
                    .flat_map(|c| c.parts)
                    .find_map(|p| p.text)
                    .ok_or(LlmError::EmptyResponse)
            }
            StatusCode::TOO_MANY_REQUESTS => Err(LlmError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                tracing::error!("Gemini returned {}: {}", status, body);
                Err(LlmError::Http { status, body })
            }
        }
    }
}

/// Structured advice when the output holds the expected JSON, raw text otherwise
pub fn parse_advice(text: &str) -> Advice {
    extract_json(text)
        .and_then(|json| serde_json::from_str::<StructuredAdvice>(json).ok())
        .map(|a| Advice::Structured {
            summary: a.summary,
            tips: a.tips,
            warnings: a.warnings,
        })
        .unwrap_or_else(|| Advice::RawText {
            text: text.trim().to_string(),
        })
}

/// JSON object inside a fenced block, or the outermost braces
fn extract_json(text: &str) -> Option<&str> {
    let fenced = Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").ok()?;
    if let Some(m) = fenced.captures(text).and_then(|c| c.get(1)) {
        return Some(m.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use backon::BackoffBuilder;

    #[test]
    fn test_retry_schedule() {
        let delays: Vec<f64> = retry_policy().build().map(|d| d.as_secs_f64()).collect();
        assert_eq!(delays.len(), 3);
        for (actual, expected) in delays.iter().zip([1.2, 1.8, 2.7]) {
            assert!((actual - expected).abs() < 0.01, "{} != {}", actual, expected);
        }
    }

    #[test]
    fn test_only_rate_limit_is_retried() {
        assert!(LlmError::RateLimited.should_retry());
        assert!(!LlmError::Http {
            status: 500,
            body: String::new()
        }
        .should_retry());
        assert!(!LlmError::Transport("reset".into()).should_retry());
    }

    #[test]
    fn test_missing_key_maps_to_unavailable() {
        let err: AppError = LlmError::MissingApiKey.into();
        assert!(matches!(err, AppError::Upstream { status: 503, .. }));
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Đây là lời khuyên:\n```json\n{\"summary\": \"Tưới vừa đủ\", \"tips\": [\"Tưới buổi sáng\"]}\n```";
        assert_eq!(
            parse_advice(text),
            Advice::Structured {
                summary: "Tưới vừa đủ".to_string(),
                tips: vec!["Tưới buổi sáng".to_string()],
                warnings: vec![],
            }
        );
    }

    #[test]
    fn test_unparseable_output_falls_back_to_raw_text() {
        let text = "  Hãy giữ đất ẩm và tránh nắng gắt.  ";
        assert_eq!(
            parse_advice(text),
            Advice::RawText {
                text: "Hãy giữ đất ẩm và tránh nắng gắt.".to_string()
            }
        );
    }
}
