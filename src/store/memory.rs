//! In-memory [`BookStore`] for tests and dry runs.
//!
//! Rows are kept as JSON column maps behind `std::sync::RwLock`. Both
//! uniqueness constraints (`uri`, `(source, source_id)`) are enforced. A
//! store can be built without some columns to emulate a legacy schema:
//! writes or lookups touching a dropped column fail with
//! [`StoreError::MissingColumn`], exactly like a hosted table would.

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::models::Curator;

use super::{BookKey, BookPatch, BookQuery, BookRow, BookStore, StoreError, StoredBook};

type Row = Map<String, Value>;

pub struct InMemoryStore {
    books: RwLock<Vec<Row>>,
    curators: RwLock<Vec<Curator>>,
    missing_columns: HashSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            books: RwLock::new(Vec::new()),
            curators: RwLock::new(Vec::new()),
            missing_columns: HashSet::new(),
        }
    }

    /// Emulate a table that lacks `column`.
    pub fn without_column(mut self, column: &str) -> Self {
        self.missing_columns.insert(column.to_string());
        self
    }

    pub fn with_curators(self, curators: Vec<Curator>) -> Self {
        if let Ok(mut stored) = self.curators.write() {
            *stored = curators;
        }
        self
    }

    pub fn len(&self) -> usize {
        self.books.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all stored books in insertion order.
    pub fn books(&self) -> Vec<StoredBook> {
        self.books
            .read()
            .map(|rows| rows.iter().filter_map(to_stored).collect())
            .unwrap_or_default()
    }

    fn check_column(&self, column: &str) -> Result<(), StoreError> {
        if self.missing_columns.contains(column) {
            Err(StoreError::MissingColumn(column.to_string()))
        } else {
            Ok(())
        }
    }

    fn find_where(&self, pred: impl Fn(&Row) -> bool) -> Result<Option<StoredBook>, StoreError> {
        let rows = self.books.read().map_err(poisoned)?;
        Ok(rows.iter().find(|r| pred(r)).and_then(to_stored))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

fn to_stored(row: &Row) -> Option<StoredBook> {
    serde_json::from_value(Value::Object(row.clone())).ok()
}

fn str_col<'a>(row: &'a Row, column: &str) -> Option<&'a str> {
    row.get(column).and_then(Value::as_str)
}

fn matches_key(row: &Row, key: &BookKey) -> bool {
    match key {
        BookKey::Uri(uri) => str_col(row, "uri") == Some(uri.as_str()),
        BookKey::SourceKey { source, source_id } => {
            str_col(row, "source") == Some(source.as_str())
                && str_col(row, "source_id") == Some(source_id.as_str())
        }
    }
}

#[async_trait]
impl BookStore for InMemoryStore {
    async fn find_by_uri(&self, uri: &str) -> Result<Option<StoredBook>, StoreError> {
        self.check_column("uri")?;
        self.find_where(|r| str_col(r, "uri") == Some(uri))
    }

    async fn find_by_source_key(
        &self,
        source: &str,
        source_id: &str,
    ) -> Result<Option<StoredBook>, StoreError> {
        self.find_where(|r| {
            str_col(r, "source") == Some(source) && str_col(r, "source_id") == Some(source_id)
        })
    }

    async fn insert_book(&self, row: &BookRow) -> Result<(), StoreError> {
        let columns = row.columns();
        for column in columns.keys() {
            self.check_column(column)?;
        }

        let mut rows = self.books.write().map_err(poisoned)?;

        let uri = str_col(&columns, "uri");
        let source = str_col(&columns, "source");
        let source_id = str_col(&columns, "source_id");
        for existing in rows.iter() {
            if uri.is_some() && str_col(existing, "uri") == uri {
                return Err(StoreError::UniqueViolation(format!(
                    "uri {}",
                    uri.unwrap_or_default()
                )));
            }
            if str_col(existing, "source") == source && str_col(existing, "source_id") == source_id
            {
                return Err(StoreError::UniqueViolation(format!(
                    "source key {}/{}",
                    source.unwrap_or_default(),
                    source_id.unwrap_or_default()
                )));
            }
        }

        rows.push(columns);
        Ok(())
    }

    async fn update_book(&self, key: &BookKey, patch: &BookPatch) -> Result<(), StoreError> {
        if let BookKey::Uri(_) = key {
            self.check_column("uri")?;
        }
        let changes = patch.to_map();
        for column in changes.keys() {
            self.check_column(column)?;
        }

        let mut rows = self.books.write().map_err(poisoned)?;
        for row in rows.iter_mut().filter(|r| matches_key(r, key)) {
            for (k, v) in &changes {
                row.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }

    async fn query_books(&self, query: &BookQuery) -> Result<Vec<StoredBook>, StoreError> {
        let rows = self.books.read().map_err(poisoned)?;
        let matching = rows
            .iter()
            .filter_map(to_stored)
            .filter(|b| query.matches(b));
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn list_curators(&self) -> Result<Vec<Curator>, StoreError> {
        Ok(self.curators.read().map_err(poisoned)?.clone())
    }

    async fn has_field(&self, field: &str) -> Result<bool, StoreError> {
        Ok(!self.missing_columns.contains(field))
    }
}
