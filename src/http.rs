//! Polite HTTP access to external catalogs.
//!
//! Every request carries the configured `User-Agent` plus an
//! `Api-User-Agent` header identifying this client, and consecutive calls
//! are spaced by at least `http.request_delay_ms`. Responses that should be
//! JSON are sniffed on their first non-whitespace character before parsing,
//! so HTML error pages surface as [`IngestError::TransientFetch`] instead of
//! parse failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::HttpConfig;
use crate::error::IngestError;

/// Header some catalog APIs require in addition to `User-Agent`.
pub const CLIENT_ID_HEADER: &str = "Api-User-Agent";

/// Enforces a minimum interval between consecutive requests.
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval,
        }
    }

    /// Wait if necessary so calls are at least `min_interval` apart.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// Shared, paced HTTP client.
#[derive(Clone)]
pub struct PoliteClient {
    http: reqwest::Client,
    user_agent: String,
    limiter: Arc<RateLimiter>,
}

impl PoliteClient {
    pub fn new(config: &HttpConfig) -> Result<Self, IngestError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            user_agent: config.user_agent.clone(),
            limiter: Arc::new(RateLimiter::new(Duration::from_millis(
                config.request_delay_ms,
            ))),
        })
    }

    /// GET `url` with query parameters and return the body text.
    ///
    /// Non-2xx statuses and transport errors are `TransientFetch`.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<String, IngestError> {
        self.limiter.wait().await;
        tracing::debug!(url = %url, params = query.len(), "GET");

        let response = self
            .http
            .get(url)
            .header(CLIENT_ID_HEADER, &self.user_agent)
            .query(query)
            .send()
            .await
            .map_err(|e| IngestError::transient(url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::transient(
                url,
                format!(
                    "HTTP {}: {}",
                    status,
                    body.chars().take(200).collect::<String>()
                ),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| IngestError::transient(url, e))
    }

    /// GET `url` and parse the body as JSON after sniffing it.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Value, IngestError> {
        let body = self.get_text(url, query).await?;
        parse_json_body(url, &body)
    }
}

/// Parse a response body that is expected to be JSON.
///
/// The first non-whitespace character must open an object or array.
pub fn parse_json_body(url: &str, body: &str) -> Result<Value, IngestError> {
    match body.trim_start().chars().next() {
        Some('{') | Some('[') => {}
        Some(c) => {
            return Err(IngestError::transient(
                url,
                format!("expected JSON, response starts with '{}'", c),
            ))
        }
        None => return Err(IngestError::transient(url, "empty response body")),
    }

    serde_json::from_str(body).map_err(|e| IngestError::transient(url, e))
}
