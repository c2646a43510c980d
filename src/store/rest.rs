//! Hosted REST record store (PostgREST dialect).
//!
//! Tables are exposed at `{url}/rest/v1/{table}`. Every request carries the
//! service credential both as `apikey` and as a bearer token. Filters use
//! PostgREST operators (`eq.`, `like.`, `is.null`).
//!
//! Error mapping:
//!
//! | Response | [`StoreError`] |
//! |----------|----------------|
//! | HTTP 409 or code `23505` | `UniqueViolation` |
//! | code `PGRST204` or `42703` | `MissingColumn` |
//! | anything else | `Backend` |

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::IngestError;
use crate::models::Curator;

use super::{BookKey, BookPatch, BookQuery, BookRow, BookStore, StoreError, StoredBook};

static SCHEMA_CACHE_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Could not find the '([^']+)' column").expect("valid pattern"));
static UNDEFINED_COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"column "?(?:[\w]+\.)?"?(\w+)"? does not exist"#).expect("valid pattern")
});

pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    books_table: String,
    curators_table: String,
}

impl RestStore {
    pub fn new(config: &StoreConfig) -> Result<Self, IngestError> {
        let base_url = config
            .url
            .clone()
            .ok_or_else(|| IngestError::Configuration("store.url required".into()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| IngestError::Configuration("store credential required".into()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::Configuration(format!("store client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            books_table: config.books_table.clone(),
            curators_table: config.curators_table.clone(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_error(status.as_u16(), &body))
    }

    async fn select_books(
        &self,
        filters: Vec<(&'static str, String)>,
    ) -> Result<Vec<StoredBook>, StoreError> {
        let mut query = vec![("select", "*".to_string())];
        query.extend(filters);
        let response = self
            .send(self.request(reqwest::Method::GET, &self.books_table).query(&query))
            .await?;
        response
            .json::<Vec<StoredBook>>()
            .await
            .map_err(|e| StoreError::Backend(format!("invalid books response: {}", e)))
    }

    async fn select_one(
        &self,
        filters: Vec<(&'static str, String)>,
    ) -> Result<Option<StoredBook>, StoreError> {
        let mut filters = filters;
        filters.push(("limit", "1".to_string()));
        Ok(self.select_books(filters).await?.into_iter().next())
    }
}

fn key_filters(key: &BookKey) -> Vec<(&'static str, String)> {
    match key {
        BookKey::Uri(uri) => vec![("uri", format!("eq.{}", uri))],
        BookKey::SourceKey { source, source_id } => vec![
            ("source", format!("eq.{}", source)),
            ("source_id", format!("eq.{}", source_id)),
        ],
    }
}

/// Translate an error response into a [`StoreError`].
pub fn map_error(status: u16, body: &str) -> StoreError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let code = parsed.get("code").and_then(Value::as_str).unwrap_or("");
    let message = parsed
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(body);

    if status == 409 || code == "23505" {
        return StoreError::UniqueViolation(message.to_string());
    }
    if code == "PGRST204" || code == "42703" {
        let column = SCHEMA_CACHE_COLUMN
            .captures(message)
            .or_else(|| UNDEFINED_COLUMN.captures(message))
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| message.to_string());
        return StoreError::MissingColumn(column);
    }
    StoreError::Backend(format!("HTTP {}: {}", status, message))
}

#[async_trait]
impl BookStore for RestStore {
    async fn find_by_uri(&self, uri: &str) -> Result<Option<StoredBook>, StoreError> {
        self.select_one(key_filters(&BookKey::Uri(uri.to_string())))
            .await
    }

    async fn find_by_source_key(
        &self,
        source: &str,
        source_id: &str,
    ) -> Result<Option<StoredBook>, StoreError> {
        self.select_one(key_filters(&BookKey::SourceKey {
            source: source.to_string(),
            source_id: source_id.to_string(),
        }))
        .await
    }

    async fn insert_book(&self, row: &BookRow) -> Result<(), StoreError> {
        let builder = self
            .request(reqwest::Method::POST, &self.books_table)
            .header("Prefer", "return=minimal")
            .json(&Value::Object(row.columns()));
        self.send(builder).await.map(|_| ())
    }

    async fn update_book(&self, key: &BookKey, patch: &BookPatch) -> Result<(), StoreError> {
        if patch.is_empty() {
            return Ok(());
        }
        let builder = self
            .request(reqwest::Method::PATCH, &self.books_table)
            .query(&key_filters(key))
            .header("Prefer", "return=minimal")
            .json(&Value::Object(patch.to_map()));
        self.send(builder).await.map(|_| ())
    }

    async fn query_books(&self, query: &BookQuery) -> Result<Vec<StoredBook>, StoreError> {
        let mut filters = Vec::new();
        if let Some(prefix) = &query.classification_prefix {
            filters.push(("classification", format!("like.{}*", prefix)));
        }
        if let Some(source) = query.source {
            filters.push(("source", format!("eq.{}", source)));
        }
        if query.missing_curator {
            filters.push(("curator_id", "is.null".to_string()));
        }
        if let Some(limit) = query.limit {
            filters.push(("limit", limit.to_string()));
        }
        filters.push(("order", "source.asc,source_id.asc".to_string()));
        self.select_books(filters).await
    }

    async fn list_curators(&self) -> Result<Vec<Curator>, StoreError> {
        let response = self
            .send(
                self.request(reqwest::Method::GET, &self.curators_table)
                    .query(&[("select", "id,name,department")]),
            )
            .await?;
        response
            .json::<Vec<Curator>>()
            .await
            .map_err(|e| StoreError::Backend(format!("invalid curators response: {}", e)))
    }

    async fn has_field(&self, field: &str) -> Result<bool, StoreError> {
        let builder = self
            .request(reqwest::Method::GET, &self.books_table)
            .query(&[("select", field), ("limit", "1")]);
        match self.send(builder).await {
            Ok(_) => Ok(true),
            Err(StoreError::MissingColumn(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
