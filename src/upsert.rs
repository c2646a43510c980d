//! Idempotent book writes.
//!
//! 1. Look the book up by `uri`; on a miss, or when the table has no `uri`
//!    column, look it up by `(source, source_id)`. Engines built with
//!    [`UpsertEngine::without_uri_lookup`] go straight to the source key.
//! 2. Found: backfill `cover_uri` and `curator_id` only where the stored row
//!    has none. Title, author and classification are never touched here.
//!    A backfill column the table lacks is dropped from the patch.
//! 3. Not found: insert the full row. When the store reports a missing
//!    optional column, drop that column and retry.
//! 4. A uniqueness violation at insert time means a concurrent writer got
//!    there first: the item is skipped, not failed.
//! 5. Anything else becomes [`IngestError::Persistence`] carrying the uri.

use crate::error::IngestError;
use crate::models::BookRecord;
use crate::store::{BookPatch, BookRow, BookStore, StoreError, StoredBook};

/// What happened to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    /// Existing row; the named fields were backfilled.
    Updated(Vec<&'static str>),
    /// Existing row with nothing to backfill, or lost an insert race.
    Skipped,
}

pub struct UpsertEngine<'a> {
    store: &'a dyn BookStore,
    dry_run: bool,
    uri_lookup: bool,
}

impl<'a> UpsertEngine<'a> {
    pub fn new(store: &'a dyn BookStore, dry_run: bool) -> Self {
        Self {
            store,
            dry_run,
            uri_lookup: true,
        }
    }

    /// Skip the `uri` lookup, for tables without a `uri` column.
    pub fn without_uri_lookup(mut self) -> Self {
        self.uri_lookup = false;
        self
    }

    pub async fn upsert(&self, book: &BookRecord) -> Result<UpsertOutcome, IngestError> {
        let outcome = match self.find_existing(book).await? {
            Some(existing) => self.backfill(book, &existing).await,
            None => self.insert(book).await,
        };
        outcome.map_err(|e| IngestError::persistence(&book.uri, e))
    }

    /// Existence check: `uri` first, then the source key.
    pub async fn find_existing(&self, book: &BookRecord) -> Result<Option<StoredBook>, IngestError> {
        if self.uri_lookup {
            let by_uri = match self.store.find_by_uri(&book.uri).await {
                Ok(found) => found,
                Err(StoreError::MissingColumn(_)) => None,
                Err(e) => return Err(IngestError::persistence(&book.uri, e)),
            };
            if by_uri.is_some() {
                return Ok(by_uri);
            }
        }
        self.store
            .find_by_source_key(book.source.as_str(), &book.source_id)
            .await
            .map_err(|e| IngestError::persistence(&book.uri, e))
    }

    async fn backfill(
        &self,
        book: &BookRecord,
        existing: &StoredBook,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut patch = backfill_patch(book, existing);
        loop {
            if patch.is_empty() {
                return Ok(UpsertOutcome::Skipped);
            }
            if self.dry_run {
                return Ok(UpsertOutcome::Updated(patch.fields()));
            }
            match self.store.update_book(&existing.key(), &patch).await {
                Ok(()) => return Ok(UpsertOutcome::Updated(patch.fields())),
                Err(StoreError::MissingColumn(column)) if patch.drop_field(&column) => {
                    tracing::debug!(uri = %book.uri, %column, "retrying backfill without column");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn insert(&self, book: &BookRecord) -> Result<UpsertOutcome, StoreError> {
        if self.dry_run {
            return Ok(UpsertOutcome::Inserted);
        }

        let mut row = BookRow::from_record(book);
        loop {
            match self.store.insert_book(&row).await {
                Ok(()) => return Ok(UpsertOutcome::Inserted),
                Err(StoreError::UniqueViolation(detail)) => {
                    tracing::debug!(uri = %book.uri, %detail, "insert lost a race, skipping");
                    return Ok(UpsertOutcome::Skipped);
                }
                Err(StoreError::MissingColumn(column)) if row.drop_optional(&column) => {
                    tracing::debug!(uri = %book.uri, %column, "retrying insert without column");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Fields the existing row lacks and the new record can supply.
pub fn backfill_patch(book: &BookRecord, existing: &StoredBook) -> BookPatch {
    BookPatch {
        cover_uri: match (&existing.cover_uri, &book.cover_uri) {
            (None, Some(cover)) => Some(cover.clone()),
            _ => None,
        },
        curator_id: match (existing.curator_id, book.curator_id) {
            (None, Some(id)) => Some(id),
            _ => None,
        },
        classification: None,
    }
}
