//! Book store abstraction.
//!
//! The [`BookStore`] trait is the whole surface the pipeline needs from the
//! persistent record store, enabling pluggable backends (hosted REST, local
//! SQLite, in-memory).
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`find_by_uri`](BookStore::find_by_uri) | Point lookup by `uri` |
//! | [`find_by_source_key`](BookStore::find_by_source_key) | Point lookup by `(source, source_id)` |
//! | [`insert_book`](BookStore::insert_book) | Insert under both uniqueness constraints |
//! | [`update_book`](BookStore::update_book) | Partial update by key |
//! | [`query_books`](BookStore::query_books) | Filtered scan (classification prefix, source, missing curator) |
//! | [`list_curators`](BookStore::list_curators) | All curator rows |
//! | [`has_field`](BookStore::has_field) | Schema probe for a named column |
//!
//! Backends report schema drift as [`StoreError::MissingColumn`] and
//! uniqueness violations as [`StoreError::UniqueViolation`] so the upsert
//! engine can react to both without inspecting backend-specific messages.

pub mod memory;
pub mod rest;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::Config;
use crate::models::{BookRecord, Curator, Source};

/// Columns every books table must have.
pub const REQUIRED_FIELDS: &[&str] = &["source", "source_id", "title"];

/// Failures reported by a [`BookStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Insert conflicted with `uri` or `(source, source_id)` uniqueness.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The table has no such column.
    #[error("missing column: {0}")]
    MissingColumn(String),

    #[error("store error: {0}")]
    Backend(String),
}

/// A book row as read back from the store.
///
/// Only the fields the pipeline consumes are modelled. `uri` is optional
/// because legacy rows (or legacy tables) may lack it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredBook {
    #[serde(default)]
    pub uri: Option<String>,
    pub source: String,
    pub source_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub cover_uri: Option<String>,
    #[serde(default)]
    pub curator_id: Option<i64>,
}

impl StoredBook {
    /// Key addressing this row: `uri` when present, else the source key.
    pub fn key(&self) -> BookKey {
        match &self.uri {
            Some(uri) if !uri.is_empty() => BookKey::Uri(uri.clone()),
            _ => BookKey::SourceKey {
                source: self.source.clone(),
                source_id: self.source_id.clone(),
            },
        }
    }

    /// `uri` if stored, otherwise reconstructed from the source key.
    pub fn display_uri(&self) -> String {
        match &self.uri {
            Some(uri) if !uri.is_empty() => uri.clone(),
            _ => format!("{}://{}", self.source, self.source_id),
        }
    }
}

/// Address of a single book row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookKey {
    Uri(String),
    SourceKey { source: String, source_id: String },
}

impl std::fmt::Display for BookKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookKey::Uri(uri) => f.write_str(uri),
            BookKey::SourceKey { source, source_id } => write!(f, "{}/{}", source, source_id),
        }
    }
}

/// Column values for an insert, split into required and optional tiers.
///
/// Optional columns can be dropped one by one when the target table turns
/// out not to have them; required columns cannot.
#[derive(Debug, Clone, PartialEq)]
pub struct BookRow {
    required: Map<String, Value>,
    optional: Map<String, Value>,
}

impl BookRow {
    pub fn from_record(book: &BookRecord) -> Self {
        let mut required = Map::new();
        required.insert("source".into(), Value::from(book.source.as_str()));
        required.insert("source_id".into(), Value::from(book.source_id.clone()));
        required.insert("title".into(), Value::from(book.title.clone()));
        required.insert("author".into(), Value::from(book.author.clone()));
        required.insert(
            "classification".into(),
            Value::from(book.classification.as_str()),
        );
        required.insert("description".into(), Value::from(book.description.clone()));

        let mut optional = Map::new();
        optional.insert("uri".into(), Value::from(book.uri.clone()));
        let mut put = |name: &str, value: Option<Value>| {
            if let Some(value) = value {
                optional.insert(name.to_string(), value);
            }
        };
        put("legacy_id", book.legacy_id.map(Value::from));
        put("language", Some(Value::from(book.language.clone())));
        put("subject", book.subject.clone().map(Value::from));
        put("publisher", book.publisher.clone().map(Value::from));
        put(
            "publication_date",
            book.publication_date.clone().map(Value::from),
        );
        put("cover_uri", book.cover_uri.clone().map(Value::from));
        put("curator_id", book.curator_id.map(Value::from));

        Self { required, optional }
    }

    /// All columns to write, required first.
    pub fn columns(&self) -> Map<String, Value> {
        let mut all = self.required.clone();
        for (k, v) in &self.optional {
            all.insert(k.clone(), v.clone());
        }
        all
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.required.contains_key(column) || self.optional.contains_key(column)
    }

    pub fn is_optional(&self, column: &str) -> bool {
        self.optional.contains_key(column)
    }

    /// Drop an optional column. Returns `false` if it was not optional.
    pub fn drop_optional(&mut self, column: &str) -> bool {
        self.optional.remove(column).is_some()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.required.get(column).or_else(|| self.optional.get(column))
    }
}

/// Fields the pipeline is allowed to change on an existing row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub cover_uri: Option<String>,
    pub curator_id: Option<i64>,
    pub classification: Option<String>,
}

impl BookPatch {
    pub fn is_empty(&self) -> bool {
        self.cover_uri.is_none() && self.curator_id.is_none() && self.classification.is_none()
    }

    /// Names of the fields this patch sets.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.cover_uri.is_some() {
            fields.push("cover_uri");
        }
        if self.curator_id.is_some() {
            fields.push("curator_id");
        }
        if self.classification.is_some() {
            fields.push("classification");
        }
        fields
    }

    /// Clear the field named `name`. Returns whether it was set.
    pub fn drop_field(&mut self, name: &str) -> bool {
        match name {
            "cover_uri" => self.cover_uri.take().is_some(),
            "curator_id" => self.curator_id.take().is_some(),
            "classification" => self.classification.take().is_some(),
            _ => false,
        }
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(cover) = &self.cover_uri {
            map.insert("cover_uri".into(), Value::from(cover.clone()));
        }
        if let Some(id) = self.curator_id {
            map.insert("curator_id".into(), Value::from(id));
        }
        if let Some(code) = &self.classification {
            map.insert("classification".into(), Value::from(code.clone()));
        }
        map
    }
}

/// Filter for [`BookStore::query_books`]. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct BookQuery {
    pub classification_prefix: Option<String>,
    pub source: Option<Source>,
    pub missing_curator: bool,
    pub limit: Option<usize>,
}

impl BookQuery {
    /// Whether `book` passes this filter (limit excluded).
    pub fn matches(&self, book: &StoredBook) -> bool {
        if let Some(prefix) = &self.classification_prefix {
            let code = book.classification.as_deref().unwrap_or("");
            if !code.starts_with(prefix.as_str()) {
                return false;
            }
        }
        if let Some(source) = self.source {
            if book.source != source.as_str() {
                return false;
            }
        }
        if self.missing_curator && book.curator_id.is_some() {
            return false;
        }
        true
    }
}

/// Abstract record store for books and curators.
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn find_by_uri(&self, uri: &str) -> Result<Option<StoredBook>, StoreError>;

    async fn find_by_source_key(
        &self,
        source: &str,
        source_id: &str,
    ) -> Result<Option<StoredBook>, StoreError>;

    /// Insert a new row; must fail with `UniqueViolation` on a duplicate
    /// `uri` or `(source, source_id)`.
    async fn insert_book(&self, row: &BookRow) -> Result<(), StoreError>;

    async fn update_book(&self, key: &BookKey, patch: &BookPatch) -> Result<(), StoreError>;

    async fn query_books(&self, query: &BookQuery) -> Result<Vec<StoredBook>, StoreError>;

    async fn list_curators(&self) -> Result<Vec<Curator>, StoreError>;

    /// Whether the books table has a column named `field`.
    async fn has_field(&self, field: &str) -> Result<bool, StoreError>;
}

/// Open the backend selected by `[store].backend`.
pub async fn open_store(config: &Config) -> Result<Box<dyn BookStore>> {
    match config.store.backend.as_str() {
        "rest" => {
            config.require_store_credentials()?;
            Ok(Box::new(rest::RestStore::new(&config.store)?))
        }
        "sqlite" => {
            let pool = crate::db::connect(config)
                .await
                .context("Failed to open SQLite store")?;
            Ok(Box::new(crate::sqlite_store::SqliteStore::new(
                pool,
                &config.store,
            )))
        }
        "memory" => Ok(Box::new(memory::InMemoryStore::new())),
        other => anyhow::bail!("Unknown store backend: '{}'", other),
    }
}
