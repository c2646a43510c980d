//! Catalog source abstraction.
//!
//! A [`CatalogSource`] pulls raw bibliographic records from an external
//! catalog one page at a time. The batch orchestrator drives it:
//!
//! ```text
//! ┌────────────────────┐  fetch_page(cursor)  ┌────────────────┐
//! │  Batch Orchestrator│ ────────────────────▶│ CatalogSource  │
//! │     (ingest)       │ ◀──────────────────── │ Wikibooks /    │
//! └─────────┬──────────┘   Page { items,       │ Gutenberg      │
//!           │                next_cursor }     └────────────────┘
//!           ▼
//!   filter → enrich → identity → classify + curator → upsert
//! ```
//!
//! Cursor-paginated sources return `next_cursor = Some(..)` until the
//! catalog is exhausted. Bulk sources return everything on the first call
//! with `next_cursor = None`.

use async_trait::async_trait;

use crate::config::Config;
use crate::connector_gutenberg::GutenbergSource;
use crate::connector_wikibooks::WikibooksSource;
use crate::error::IngestError;
use crate::http::PoliteClient;
use crate::models::{RawRecord, Source};

/// One page of raw records plus the continuation token, if any.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<RawRecord>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// A terminal page (no continuation).
    pub fn last(items: Vec<RawRecord>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// An external catalog producing raw records.
///
/// # Lifecycle
///
/// 1. Built by [`create_source`] from the config.
/// 2. [`fetch_page`](CatalogSource::fetch_page) is called with `None`, then
///    with each returned `next_cursor` until it is `None` or the item cap is
///    reached.
/// 3. For every record that passes the filter,
///    [`enrich`](CatalogSource::enrich) is called once before resolution.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Which catalog this is; stamped on every produced record.
    fn source(&self) -> Source;

    /// One-line description for `biblio sources` and logs.
    fn description(&self) -> &str;

    /// Fetch one page starting at `cursor` (`None` for the first page).
    async fn fetch_page(&self, cursor: Option<&str>) -> Result<Page, IngestError>;

    /// Fill in per-item detail that the listing does not carry.
    ///
    /// Sources whose listing is already complete keep the default.
    async fn enrich(&self, record: RawRecord) -> Result<RawRecord, IngestError> {
        Ok(record)
    }
}

/// Build the catalog source named `source`.
pub fn create_source(
    config: &Config,
    source: Source,
    client: PoliteClient,
) -> Result<Box<dyn CatalogSource>, IngestError> {
    match source {
        Source::Gutenberg => Ok(Box::new(GutenbergSource::new(
            config.sources.gutenberg.clone(),
            client,
        ))),
        Source::Wikibooks => Ok(Box::new(WikibooksSource::new(
            config.sources.wikibooks.clone(),
            client,
        ))),
        Source::Custom => Err(IngestError::Configuration(
            "the custom source has no built-in catalog; use gutenberg or wikibooks".to_string(),
        )),
    }
}
