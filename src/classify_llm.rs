//! Remote text-generation classifier.
//!
//! Sends the book's title and description to an OpenAI-compatible chat
//! completions endpoint with an instruction to answer with a single 3-digit
//! code, then extracts the first standalone 3-digit number from the reply.
//!
//! Retry strategy (bounded by `classifier.max_retries`):
//! - HTTP 429 or 5xx → retry with exponential backoff
//! - HTTP 4xx (not 429) → fail immediately
//! - Network error → retry
//!
//! Consecutive requests are spaced by `classifier.request_delay_ms`.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use crate::classify::Classifier;
use crate::config::{ClassifierConfig, ENV_CLASSIFIER_KEY};
use crate::error::IngestError;
use crate::http::RateLimiter;
use crate::models::ClassificationCode;

static CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{3})\b").expect("valid code pattern"));

const SYSTEM_PROMPT: &str = "You are a librarian assigning Dewey Decimal classes. \
Reply with exactly one 3-digit class number (000-999) and nothing else.";

pub struct LlmClassifier {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_retries: u32,
    limiter: RateLimiter,
}

impl LlmClassifier {
    /// Build a classifier from `[classifier]`; endpoint, model and key are
    /// all required.
    pub fn new(config: &ClassifierConfig) -> Result<Self, IngestError> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            IngestError::Configuration("classifier.endpoint required for llm provider".into())
        })?;
        let model = config.model.clone().ok_or_else(|| {
            IngestError::Configuration("classifier.model required for llm provider".into())
        })?;
        let api_key = config.api_key.clone().ok_or_else(|| {
            IngestError::Configuration(format!("{} not set", ENV_CLASSIFIER_KEY))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::Configuration(format!("classifier client: {}", e)))?;

        Ok(Self {
            http,
            endpoint,
            model,
            api_key,
            max_retries: config.max_retries,
            limiter: RateLimiter::new(Duration::from_millis(config.request_delay_ms)),
        })
    }

    fn request_body(&self, title: &str, description: &str) -> Value {
        json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {
                    "role": "user",
                    "content": format!("Title: {}\nDescription: {}", title, description)
                }
            ]
        })
    }

    async fn complete(&self, body: &Value) -> Result<String, IngestError> {
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }
            self.limiter.wait().await;

            let resp = self
                .http
                .post(&self.endpoint)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: Value = response.json().await.map_err(|e| {
                            IngestError::Classification(format!("invalid response: {}", e))
                        })?;
                        return parse_completion(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = IngestError::Classification(format!(
                        "classifier endpoint error {}: {}",
                        status, body_text
                    ));
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::debug!(%status, attempt, "classifier request will be retried");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(IngestError::Classification(format!(
                        "classifier request failed: {}",
                        e
                    )));
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| IngestError::Classification("classification failed".into())))
    }
}

#[async_trait]
impl Classifier for LlmClassifier {
    fn name(&self) -> &str {
        "llm"
    }

    async fn classify(
        &self,
        title: &str,
        description: &str,
    ) -> Result<ClassificationCode, IngestError> {
        let body = self.request_body(title, description);
        let reply = self.complete(&body).await?;
        extract_code(&reply).ok_or_else(|| {
            IngestError::Classification(format!(
                "no 3-digit code in reply: {}",
                reply.chars().take(80).collect::<String>()
            ))
        })
    }
}

/// Take `choices[0].message.content` from a chat completion.
pub fn parse_completion(json: &Value) -> Result<String, IngestError> {
    json.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            IngestError::Classification("response has no choices[0].message.content".into())
        })
}

/// First standalone 3-digit number in `text`.
pub fn extract_code(text: &str) -> Option<ClassificationCode> {
    CODE_PATTERN
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .find_map(|m| ClassificationCode::parse(m.as_str()))
}
