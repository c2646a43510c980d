//! Ingestion pipeline orchestration.
//!
//! Coordinates a full catalog run: source → filter → enrich → identity →
//! classification + curator match → normalization → upsert. Records are
//! processed strictly in the order the source yields them, in batches that
//! only pace the run (an item delay between records, a longer batch delay
//! between batches). A failure on one item is logged, counted and skipped;
//! only configuration problems detected before the first item abort a run.

use std::time::Duration;

use anyhow::Result;

use crate::classify::{create_classifier, Classifier};
use crate::config::Config;
use crate::curator::{match_curator, BookText};
use crate::error::IngestError;
use crate::filter;
use crate::http::PoliteClient;
use crate::identity;
use crate::models::{Curator, RawRecord, Source};
use crate::normalize::build_record;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::store::{open_store, BookStore, REQUIRED_FIELDS};
use crate::traits::{create_source, CatalogSource, Page};
use crate::upsert::{UpsertEngine, UpsertOutcome};

/// Run-level switches from the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestOptions {
    /// Cap on records that pass the filter; `None` means the whole catalog.
    pub limit: Option<usize>,
    pub dry_run: bool,
}

/// End-of-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub fetched: u64,
    pub filtered: u64,
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub curator_linked: u64,
}

impl IngestSummary {
    fn record(&mut self, outcome: &UpsertOutcome, linked: bool) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated(_) => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
        if linked {
            self.curator_linked += 1;
        }
    }

    pub fn processed(&self) -> u64 {
        self.inserted + self.updated + self.skipped + self.errors
    }

    pub fn print(&self, source: Source, dry_run: bool) {
        if dry_run {
            println!("ingest {} (dry-run)", source);
        } else {
            println!("ingest {}", source);
        }
        println!("  fetched: {} records", self.fetched);
        println!("  filtered out: {}", self.filtered);
        println!("  inserted: {}", self.inserted);
        println!("  updated: {}", self.updated);
        println!("  skipped: {}", self.skipped);
        println!("  errors: {}", self.errors);
        println!("  curators linked: {}", self.curator_linked);
        println!("ok");
    }
}

/// Everything one ingest run needs, borrowed from the caller.
pub struct Pipeline<'a> {
    pub config: &'a Config,
    pub source: &'a dyn CatalogSource,
    pub classifier: &'a dyn Classifier,
    pub store: &'a dyn BookStore,
    pub progress: &'a dyn IngestProgressReporter,
}

impl<'a> Pipeline<'a> {
    /// Probe the books table for required fields.
    ///
    /// Returns whether the table has a `uri` column. A missing required
    /// field is a [`IngestError::Configuration`]. A failed `uri` check is
    /// logged and the column assumed present.
    pub async fn preflight(&self) -> Result<bool, IngestError> {
        for field in REQUIRED_FIELDS {
            let present = self
                .store
                .has_field(field)
                .await
                .map_err(|e| IngestError::Configuration(format!("store probe failed: {}", e)))?;
            if !present {
                return Err(IngestError::Configuration(format!(
                    "books table is missing required column '{}'",
                    field
                )));
            }
        }

        let has_uri = match self.store.has_field("uri").await {
            Ok(present) => present,
            Err(e) => {
                tracing::warn!(error = %e, "uri column check failed; keeping uri lookups");
                true
            }
        };
        if !has_uri {
            tracing::warn!("books table has no uri column; writing in legacy mode");
        }
        Ok(has_uri)
    }

    /// Drive a full run and return its counters.
    pub async fn run(&self, options: IngestOptions) -> Result<IngestSummary, IngestError> {
        let has_uri = self.preflight().await?;

        let curators = match self.store.list_curators().await {
            Ok(curators) => curators,
            Err(e) => {
                tracing::warn!(error = %e, "could not load curators; curator matching disabled");
                Vec::new()
            }
        };
        tracing::info!(
            source = %self.source.source(),
            curators = curators.len(),
            limit = ?options.limit,
            dry_run = options.dry_run,
            "starting ingest"
        );

        let mut engine = UpsertEngine::new(self.store, options.dry_run);
        if !has_uri {
            engine = engine.without_uri_lookup();
        }
        let batch_size = self.config.batch_size_for(self.source.source());
        let progress_every = self.config.ingest.progress_every.max(1);

        let mut summary = IngestSummary::default();
        let mut batch: Vec<RawRecord> = Vec::with_capacity(batch_size);
        let mut batches = 0u64;
        let mut accepted = 0usize;
        let mut next_report = progress_every;
        let mut cursor: Option<String> = None;

        'pages: loop {
            let page = match self.fetch_with_retry(cursor.as_deref()).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(
                        source = %self.source.source(),
                        cursor = ?cursor,
                        error = %e,
                        "page fetch failed; stopping fetch"
                    );
                    summary.errors += 1;
                    break;
                }
            };

            for raw in page.items {
                if options.limit.is_some_and(|limit| accepted >= limit) {
                    break 'pages;
                }

                summary.fetched += 1;
                if summary.fetched >= next_report {
                    self.progress.report(IngestProgressEvent::Fetching {
                        source: self.source.source().to_string(),
                        fetched: summary.fetched,
                    });
                    next_report += progress_every;
                }

                if !filter::accept(&raw) {
                    tracing::debug!(title = raw.title_or_empty(), "filtered out");
                    summary.filtered += 1;
                    continue;
                }

                accepted += 1;
                batch.push(raw);
                if batch.len() >= batch_size {
                    self.run_batch(&engine, &curators, &mut batch, &mut batches, &mut summary)
                        .await?;
                }
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        if !batch.is_empty() {
            self.run_batch(&engine, &curators, &mut batch, &mut batches, &mut summary)
                .await?;
        }

        tracing::info!(
            inserted = summary.inserted,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors,
            "ingest finished"
        );
        Ok(summary)
    }

    /// Fetch a page, retrying once after the batch delay.
    async fn fetch_with_retry(&self, cursor: Option<&str>) -> Result<Page, IngestError> {
        match self.source.fetch_page(cursor).await {
            Ok(page) => Ok(page),
            Err(first) => {
                tracing::warn!(error = %first, "page fetch failed; retrying once");
                pause(self.config.http.batch_delay_ms).await;
                self.source.fetch_page(cursor).await
            }
        }
    }

    async fn run_batch(
        &self,
        engine: &UpsertEngine<'_>,
        curators: &[Curator],
        batch: &mut Vec<RawRecord>,
        batches: &mut u64,
        summary: &mut IngestSummary,
    ) -> Result<(), IngestError> {
        if *batches > 0 {
            pause(self.config.http.batch_delay_ms).await;
        }
        *batches += 1;

        for (i, raw) in batch.drain(..).enumerate() {
            if i > 0 {
                pause(self.config.http.request_delay_ms).await;
            }
            let key = raw.key.clone();
            match self.process_item(engine, curators, raw).await {
                Ok((outcome, linked)) => summary.record(&outcome, linked),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        source = %self.source.source(),
                        key = %key,
                        kind = e.kind(),
                        error = %e,
                        "item failed"
                    );
                    summary.errors += 1;
                }
            }
        }

        self.progress.report(IngestProgressEvent::Batch {
            source: self.source.source().to_string(),
            batch: *batches,
            processed: summary.processed(),
        });
        Ok(())
    }

    /// Resolve, classify, match and upsert a single accepted record.
    ///
    /// Returns the upsert outcome and whether a curator link was written.
    pub async fn process_item(
        &self,
        engine: &UpsertEngine<'_>,
        curators: &[Curator],
        raw: RawRecord,
    ) -> Result<(UpsertOutcome, bool), IngestError> {
        let raw = self.source.enrich(raw).await?;
        let identity = identity::resolve(&raw)?;

        let title = raw.title_or_empty();
        let text = raw
            .description
            .as_deref()
            .or(raw.subject.as_deref())
            .unwrap_or("");
        let classification = self.classifier.classify(title, text).await?;
        let curator_id = match_curator(
            &BookText::new(title, text, raw.subject.as_deref()),
            curators,
            &self.config.curator_match,
        );

        let book = build_record(
            &raw,
            &identity,
            classification,
            curator_id,
            self.config.ingest.description_max_chars,
        );
        let outcome = engine.upsert(&book).await?;
        let linked = match &outcome {
            UpsertOutcome::Inserted => book.curator_id.is_some(),
            UpsertOutcome::Updated(fields) => fields.contains(&"curator_id"),
            UpsertOutcome::Skipped => false,
        };
        tracing::debug!(uri = %book.uri, outcome = ?outcome, "upserted");
        Ok((outcome, linked))
    }
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// `biblio ingest <source> [count|all]`.
pub async fn run_ingest(
    config: &Config,
    source: &str,
    limit: Option<usize>,
    dry_run: bool,
    progress: ProgressMode,
) -> Result<()> {
    let source: Source = source.parse().map_err(anyhow::Error::msg)?;

    config.require_store_credentials()?;
    config.require_classifier_credentials()?;

    let client = PoliteClient::new(&config.http)?;
    let catalog = create_source(config, source, client)?;
    let classifier = create_classifier(config, source)?;
    let store = open_store(config).await?;
    let reporter = progress.reporter();

    let pipeline = Pipeline {
        config,
        source: catalog.as_ref(),
        classifier: classifier.as_ref(),
        store: store.as_ref(),
        progress: reporter.as_ref(),
    };
    let summary = pipeline.run(IngestOptions { limit, dry_run }).await?;
    summary.print(source, dry_run);
    Ok(())
}
