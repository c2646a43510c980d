//! SQLite-backed [`BookStore`] implementation.
//!
//! Maps each store operation onto SQL against the schema created by
//! [`crate::migrate`]. Column lists are built from the row being written, so
//! a table created by an older schema (for example without `uri`) reports
//! the offending column as [`StoreError::MissingColumn`] instead of failing
//! opaquely.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{query::Query, Row, Sqlite, SqlitePool};

use crate::config::StoreConfig;
use crate::models::Curator;
use crate::store::{BookKey, BookPatch, BookQuery, BookRow, BookStore, StoreError, StoredBook};

/// SQLite implementation of the [`BookStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    books_table: String,
    curators_table: String,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool, config: &StoreConfig) -> Self {
        Self {
            pool,
            books_table: config.books_table.clone(),
            curators_table: config.curators_table.clone(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn select_one(
        &self,
        where_clause: &str,
        params: &[&str],
    ) -> Result<Option<StoredBook>, StoreError> {
        let sql = format!(
            r#"SELECT * FROM "{}" WHERE {} LIMIT 1"#,
            self.books_table, where_clause
        );
        let mut query = sqlx::query(&sql);
        for p in params {
            query = query.bind(*p);
        }
        let row = query.fetch_optional(&self.pool).await.map_err(map_error)?;
        Ok(row.map(|r| stored_book(&r)))
    }
}

fn opt_text(row: &SqliteRow, column: &str) -> Option<String> {
    row.try_get::<Option<String>, _>(column).ok().flatten()
}

fn stored_book(row: &SqliteRow) -> StoredBook {
    StoredBook {
        uri: opt_text(row, "uri"),
        source: opt_text(row, "source").unwrap_or_default(),
        source_id: opt_text(row, "source_id").unwrap_or_default(),
        title: opt_text(row, "title").unwrap_or_default(),
        author: opt_text(row, "author"),
        classification: opt_text(row, "classification"),
        description: opt_text(row, "description"),
        subject: opt_text(row, "subject"),
        cover_uri: opt_text(row, "cover_uri"),
        curator_id: row.try_get::<Option<i64>, _>("curator_id").ok().flatten(),
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Column name after `marker` in an SQLite error message.
fn column_after(message: &str, marker: &str) -> Option<String> {
    let rest = &message[message.find(marker)? + marker.len()..];
    let name: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .collect();
    let name = name.rsplit('.').next().unwrap_or("").to_string();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Translate an sqlx error into a [`StoreError`].
pub fn map_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let message = db_err.message();
        if db_err.is_unique_violation() || message.contains("UNIQUE constraint failed") {
            return StoreError::UniqueViolation(message.to_string());
        }
        for marker in ["has no column named", "no such column:"] {
            if let Some(column) = column_after(message, marker) {
                return StoreError::MissingColumn(column);
            }
        }
    }
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl BookStore for SqliteStore {
    async fn find_by_uri(&self, uri: &str) -> Result<Option<StoredBook>, StoreError> {
        self.select_one("uri = ?", &[uri]).await
    }

    async fn find_by_source_key(
        &self,
        source: &str,
        source_id: &str,
    ) -> Result<Option<StoredBook>, StoreError> {
        self.select_one("source = ? AND source_id = ?", &[source, source_id])
            .await
    }

    async fn insert_book(&self, row: &BookRow) -> Result<(), StoreError> {
        let columns = row.columns();
        let names: Vec<&str> = columns.keys().map(String::as_str).collect();
        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            r#"INSERT INTO "{}" ({}) VALUES ({})"#,
            self.books_table,
            names.join(", "),
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for value in columns.values() {
            query = bind_value(query, value);
        }
        query.execute(&self.pool).await.map_err(map_error)?;
        Ok(())
    }

    async fn update_book(&self, key: &BookKey, patch: &BookPatch) -> Result<(), StoreError> {
        let changes = patch.to_map();
        if changes.is_empty() {
            return Ok(());
        }
        let assignments: Vec<String> = changes.keys().map(|k| format!("{} = ?", k)).collect();
        let where_clause = match key {
            BookKey::Uri(_) => "uri = ?",
            BookKey::SourceKey { .. } => "source = ? AND source_id = ?",
        };
        let sql = format!(
            r#"UPDATE "{}" SET {} WHERE {}"#,
            self.books_table,
            assignments.join(", "),
            where_clause
        );

        let mut query = sqlx::query(&sql);
        for value in changes.values() {
            query = bind_value(query, value);
        }
        query = match key {
            BookKey::Uri(uri) => query.bind(uri.clone()),
            BookKey::SourceKey { source, source_id } => {
                query.bind(source.clone()).bind(source_id.clone())
            }
        };
        query.execute(&self.pool).await.map_err(map_error)?;
        Ok(())
    }

    async fn query_books(&self, q: &BookQuery) -> Result<Vec<StoredBook>, StoreError> {
        let mut clauses = Vec::new();
        let mut params: Vec<String> = Vec::new();
        if let Some(prefix) = &q.classification_prefix {
            clauses.push("classification LIKE ?");
            params.push(format!("{}%", prefix));
        }
        if let Some(source) = q.source {
            clauses.push("source = ?");
            params.push(source.as_str().to_string());
        }
        if q.missing_curator {
            clauses.push("curator_id IS NULL");
        }

        let mut sql = format!(r#"SELECT * FROM "{}""#, self.books_table);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY rowid");
        if let Some(limit) = q.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut query = sqlx::query(&sql);
        for p in &params {
            query = query.bind(p.as_str());
        }
        let rows = query.fetch_all(&self.pool).await.map_err(map_error)?;
        Ok(rows.iter().map(stored_book).collect())
    }

    async fn list_curators(&self) -> Result<Vec<Curator>, StoreError> {
        let sql = format!(
            r#"SELECT id, name, department FROM "{}" ORDER BY id"#,
            self.curators_table
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_error)?;
        rows.iter()
            .map(|r| {
                Ok(Curator {
                    id: r.try_get("id").map_err(map_error)?,
                    name: r.try_get("name").map_err(map_error)?,
                    department: r.try_get("department").map_err(map_error)?,
                })
            })
            .collect()
    }

    async fn has_field(&self, field: &str) -> Result<bool, StoreError> {
        let columns: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
            .bind(&self.books_table)
            .fetch_all(&self.pool)
            .await
            .map_err(map_error)?;
        Ok(columns.iter().any(|c| c == field))
    }
}
